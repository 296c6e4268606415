//! Decodes PUG REST payloads.
//!
//! JSON bodies are sorted into one of three envelopes (pending job, fault, data);
//! data is then unwrapped from its container into an ordered list of raw items.
//! Other formats are only checked for plausibility and passed through.

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::classify::{classify, ServerFault};
use super::PubChemError;
use crate::models::{
    Assay, Compound, Domain, OutputFormat, Pagination, PropertyRow, Substance, SynonymSet,
};

/// Top-level shape of a JSON response
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// The job behind `list_key` is still running
    Waiting {
        list_key: String,
        message: Option<String>,
    },
    Fault(ServerFault),
    Data(Value),
}

impl Envelope {
    pub fn parse(body: &[u8]) -> Result<Self, PubChemError> {
        let value: Value = serde_json::from_slice(body)?;

        if let Some(waiting) = value.get("Waiting") {
            let list_key = match waiting.get("ListKey") {
                Some(Value::String(key)) => key.clone(),
                Some(Value::Number(key)) => key.to_string(),
                _ => {
                    return Err(PubChemError::ResponseParse(
                        "waiting response without a list key".to_string(),
                    ))
                }
            };
            let message = waiting
                .get("Message")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok(Envelope::Waiting { list_key, message });
        }

        if value.get("Fault").is_some() {
            return Ok(Envelope::Fault(classify(StatusCode::OK, body)));
        }

        Ok(Envelope::Data(value))
    }
}

/// Identifier kinds in identifier lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IdKind {
    Cid,
    Sid,
    Aid,
}

impl IdKind {
    pub fn key(&self) -> &'static str {
        match self {
            IdKind::Cid => "CID",
            IdKind::Sid => "SID",
            IdKind::Aid => "AID",
        }
    }
}

/// The container a result set was unwrapped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultShape {
    Compounds,
    Substances,
    Assays,
    Identifiers(IdKind),
    Properties,
    Information,
    SourceNames,
}

/// Ordered raw items from one or more result pages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    shape: ResultShape,
    items: Vec<Value>,
    /// Total size of the underlying list, when the service reports it
    total: Option<u64>,
}

fn items_of(value: &Value, key: &str) -> Result<Vec<Value>, PubChemError> {
    match value.get(key) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(PubChemError::ResponseParse(format!(
            "expected {} to be an array",
            key
        ))),
        None => Ok(Vec::new()),
    }
}

impl ResultSet {
    pub fn empty(shape: ResultShape) -> Self {
        Self {
            shape,
            items: Vec::new(),
            total: None,
        }
    }

    /// Unwrap a data envelope
    pub fn from_json(value: &Value) -> Result<Self, PubChemError> {
        let containers = [
            (Domain::Compound, ResultShape::Compounds),
            (Domain::Substance, ResultShape::Substances),
            (Domain::Assay, ResultShape::Assays),
        ];
        for (domain, shape) in containers {
            let key = domain.container_key();
            if value.get(key).is_some() {
                return Ok(Self {
                    shape,
                    items: items_of(value, key)?,
                    total: None,
                });
            }
        }

        if let Some(list) = value.get("IdentifierList") {
            for kind in [IdKind::Cid, IdKind::Sid, IdKind::Aid] {
                if list.get(kind.key()).is_some() {
                    return Ok(Self {
                        shape: ResultShape::Identifiers(kind),
                        items: items_of(list, kind.key())?,
                        total: list.get("Size").and_then(Value::as_u64),
                    });
                }
            }
        }

        if let Some(table) = value.get("PropertyTable") {
            return Ok(Self {
                shape: ResultShape::Properties,
                items: items_of(table, "Properties")?,
                total: None,
            });
        }

        if let Some(info) = value.get("InformationList") {
            if info.get("SourceName").is_some() {
                return Ok(Self {
                    shape: ResultShape::SourceNames,
                    items: items_of(info, "SourceName")?,
                    total: None,
                });
            }
            return Ok(Self {
                shape: ResultShape::Information,
                items: items_of(info, "Information")?,
                total: None,
            });
        }

        let keys: Vec<&str> = value
            .as_object()
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        Err(PubChemError::ResponseParse(format!(
            "unrecognised response container {:?}",
            keys
        )))
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Append a following page
    pub fn extend(&mut self, page: ResultSet) {
        self.items.extend(page.items);
        if self.total.is_none() {
            self.total = page.total;
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Apply a pagination window locally, for results that arrived in one piece
    pub fn window(mut self, pagination: Pagination) -> Self {
        let start = pagination.start.unwrap_or(0) as usize;
        let total = self.items.len();
        self.items.drain(..start.min(total));
        if let Some(count) = pagination.count {
            self.items.truncate(count as usize);
        }
        self.total.get_or_insert(total as u64);
        self
    }

    fn expect_shape(&self, expected: ResultShape) -> Result<(), PubChemError> {
        if self.shape == expected || self.items.is_empty() {
            Ok(())
        } else {
            Err(PubChemError::ResponseParse(format!(
                "expected {:?} but the response holds {:?}",
                expected, self.shape
            )))
        }
    }

    pub fn compounds(&self) -> Result<Vec<Compound>, PubChemError> {
        self.expect_shape(ResultShape::Compounds)?;
        self.items
            .iter()
            .map(|item| Compound::from_record(item).map_err(PubChemError::from))
            .collect()
    }

    pub fn substances(&self) -> Result<Vec<Substance>, PubChemError> {
        self.expect_shape(ResultShape::Substances)?;
        self.items
            .iter()
            .map(|item| Substance::from_record(item).map_err(PubChemError::from))
            .collect()
    }

    pub fn assays(&self) -> Result<Vec<Assay>, PubChemError> {
        self.expect_shape(ResultShape::Assays)?;
        self.items
            .iter()
            .map(|item| Assay::from_record(item).map_err(PubChemError::from))
            .collect()
    }

    pub fn properties(&self) -> Result<Vec<PropertyRow>, PubChemError> {
        self.expect_shape(ResultShape::Properties)?;
        self.items
            .iter()
            .map(|item| {
                item.as_object().map(PropertyRow::from_json).ok_or_else(|| {
                    PubChemError::ResponseParse("property row is not an object".to_string())
                })
            })
            .collect()
    }

    /// Identifiers of one kind, flattened across information entries
    pub fn identifiers(&self, kind: IdKind) -> Result<Vec<u64>, PubChemError> {
        let not_numeric =
            || PubChemError::ResponseParse(format!("non-numeric {} in response", kind.key()));

        match self.shape {
            ResultShape::Identifiers(found) if found == kind => self
                .items
                .iter()
                .map(|id| id.as_u64().ok_or_else(not_numeric))
                .collect(),
            ResultShape::Information => {
                let mut ids = Vec::new();
                for entry in &self.items {
                    match entry.get(kind.key()) {
                        Some(Value::Array(values)) => {
                            for id in values {
                                ids.push(id.as_u64().ok_or_else(not_numeric)?);
                            }
                        }
                        Some(id) => ids.push(id.as_u64().ok_or_else(not_numeric)?),
                        None => {}
                    }
                }
                Ok(ids)
            }
            _ if self.items.is_empty() => Ok(Vec::new()),
            other => Err(PubChemError::ResponseParse(format!(
                "expected {} identifiers but the response holds {:?}",
                kind.key(),
                other
            ))),
        }
    }

    pub fn synonyms(&self) -> Result<Vec<SynonymSet>, PubChemError> {
        self.expect_shape(ResultShape::Information)?;
        Ok(self
            .items
            .iter()
            .map(|entry| SynonymSet {
                cid: entry.get("CID").and_then(Value::as_u64),
                sid: entry.get("SID").and_then(Value::as_u64),
                synonyms: entry
                    .get("Synonym")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect())
    }

    pub fn source_names(&self) -> Result<Vec<String>, PubChemError> {
        self.expect_shape(ResultShape::SourceNames)?;
        Ok(self
            .items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }
}

/// Confirm a passthrough payload is plausibly in the declared format
pub fn check_format(format: OutputFormat, body: &[u8]) -> Result<(), PubChemError> {
    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    let mismatch = |why: &str| {
        Err(PubChemError::ResponseParse(format!(
            "payload is not {}: {}",
            format.as_str(),
            why
        )))
    };

    if body.is_empty() {
        return mismatch("empty body");
    }

    match format {
        OutputFormat::Png => {
            if !body.starts_with(PNG_MAGIC) {
                return mismatch("missing PNG signature");
            }
        }
        OutputFormat::Json => {
            if let Err(e) = serde_json::from_slice::<serde::de::IgnoredAny>(body) {
                return mismatch(&e.to_string());
            }
        }
        OutputFormat::Xml => {
            let mut reader = quick_xml::Reader::from_reader(body);
            let mut buf = Vec::new();
            let mut saw_element = false;
            loop {
                match reader.read_event_into(&mut buf) {
                    Ok(quick_xml::events::Event::Start(_))
                    | Ok(quick_xml::events::Event::Empty(_)) => {
                        saw_element = true;
                        break;
                    }
                    Ok(quick_xml::events::Event::Eof) => break,
                    Ok(_) => {}
                    Err(e) => return mismatch(&e.to_string()),
                }
                buf.clear();
            }
            if !saw_element {
                return mismatch("no root element");
            }
        }
        OutputFormat::Sdf => {
            let text = String::from_utf8_lossy(body);
            if !text.contains("$$$$") && !text.contains("M  END") {
                return mismatch("no molfile terminator");
            }
        }
        OutputFormat::Csv | OutputFormat::Txt | OutputFormat::Asnt => {
            if std::str::from_utf8(body).is_err() {
                return mismatch("not valid UTF-8 text");
            }
        }
        OutputFormat::Asnb => {}
    }
    Ok(())
}
