//! Substance records as deposited by PubChem data sources.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::compound::{Compound, CompoundIdType};
use super::RecordError;

#[derive(Debug, Deserialize)]
struct RawSubstance {
    sid: RawSid,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    compound: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawSid {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    db: RawSourceDb,
}

#[derive(Debug, Deserialize)]
struct RawSourceDb {
    name: String,
    #[serde(default)]
    source_id: Option<RawSourceId>,
}

#[derive(Debug, Deserialize)]
struct RawSourceId {
    #[serde(rename = "str", default)]
    value: Option<String>,
}

/// A single record from the PubChem Substance database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Substance {
    sid: u64,
    source_name: Option<String>,
    source_id: Option<String>,
    synonyms: Vec<String>,
    standardized_cid: Option<u64>,
    deposited_compound: Option<Compound>,
    #[serde(skip)]
    record: Value,
}

impl Substance {
    /// Decode one entry of `PC_Substances`
    pub fn from_record(record: &Value) -> Result<Self, RecordError> {
        let raw: RawSubstance = serde_json::from_value(record.clone())
            .map_err(|e| RecordError::malformed("substance", e))?;

        let mut standardized_cid = None;
        let mut deposited_compound = None;
        for entry in &raw.compound {
            let id_type = entry
                .pointer("/id/type")
                .and_then(Value::as_i64)
                .map(CompoundIdType::from_code);
            match id_type {
                Some(CompoundIdType::Standardized) if standardized_cid.is_none() => {
                    standardized_cid = entry.pointer("/id/id/cid").and_then(Value::as_u64);
                }
                Some(CompoundIdType::Deposited) if deposited_compound.is_none() => {
                    deposited_compound = Some(Compound::from_record(entry)?);
                }
                _ => {}
            }
        }

        let (source_name, source_id) = match raw.source {
            Some(source) => (
                Some(source.db.name),
                source.db.source_id.and_then(|id| id.value),
            ),
            None => (None, None),
        };

        Ok(Self {
            sid: raw.sid.id,
            source_name,
            source_id,
            synonyms: raw.synonyms,
            standardized_cid,
            deposited_compound,
            record: record.clone(),
        })
    }

    pub fn sid(&self) -> u64 {
        self.sid
    }

    /// Name of the depositor
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// Identifier of this substance within its depositor's collection
    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn synonyms(&self) -> &[String] {
        &self.synonyms
    }

    /// CID produced by standardization; absent when the substance could not be standardized
    pub fn standardized_cid(&self) -> Option<u64> {
        self.standardized_cid
    }

    /// The structure as deposited; it has no CID and few computed properties
    pub fn deposited_compound(&self) -> Option<&Compound> {
        self.deposited_compound.as_ref()
    }

    pub fn record(&self) -> &Value {
        &self.record
    }
}

impl fmt::Display for Substance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Substance({})", self.sid)
    }
}
