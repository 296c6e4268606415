//! Turns a [`Query`] into a PUG REST request.
//!
//! Paths follow `<domain>[/<search>]/<namespace>[/<identifier>]/<operation>/<format>`.
//! Line notations and oversized identifiers move into a form body keyed by the
//! namespace, and the identifier segment is left out of the path.

use http::Method;
use std::collections::BTreeMap;
use url::form_urlencoded;

use super::{HttpRequest, PubChemError};
use crate::models::{
    normalize_property_name, Domain, Identifier, Operation, OutputFormat, Query, SearchType,
};

/// Longest encoded identifier kept in the URL path
const MAX_PATH_IDENTIFIER_LEN: usize = 1800;

/// A request descriptor, independent of the base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolRequest {
    pub method: Method,
    /// Path below the service root, without a leading slash
    pub path: String,
    /// Query-string parameters, in order
    pub params: Vec<(String, String)>,
    /// Form fields sent as `application/x-www-form-urlencoded`
    pub form: Option<Vec<(String, String)>>,
}

impl ProtocolRequest {
    fn get(path: String) -> Self {
        Self {
            method: Method::GET,
            path,
            params: Vec::new(),
            form: None,
        }
    }

    /// Full URL below `base`
    pub fn url(&self, base: &str) -> String {
        let mut url = format!("{}/{}", base.trim_end_matches('/'), self.path);
        if !self.params.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.params)
                .finish();
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    pub fn form_body(&self) -> Option<String> {
        self.form.as_ref().map(|fields| {
            form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish()
        })
    }

    pub fn to_http(&self, base: &str) -> HttpRequest {
        let body = self.form_body();
        let mut headers = Vec::new();
        if body.is_some() {
            headers.push((
                http::header::CONTENT_TYPE.to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ));
        }
        HttpRequest {
            method: self.method.clone(),
            url: self.url(base),
            headers,
            body,
        }
    }
}

/// One page of a list-key result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: u32,
    pub count: u32,
}

fn precondition(message: impl Into<String>) -> PubChemError {
    PubChemError::Precondition(message.into())
}

fn operation_segment(operation: &Operation) -> Result<Option<String>, PubChemError> {
    let segment = match operation {
        Operation::Record => return Ok(None),
        Operation::Property(tags) => {
            let tags: Vec<String> = tags
                .iter()
                .map(|tag| normalize_property_name(tag))
                .filter(|tag| !tag.is_empty())
                .map(|tag| urlencoding::encode(&tag).into_owned())
                .collect();
            if tags.is_empty() {
                return Err(precondition("property operation needs at least one tag"));
            }
            format!("property/{}", tags.join(","))
        }
        Operation::Synonyms => "synonyms".to_string(),
        Operation::Cids => "cids".to_string(),
        Operation::Sids => "sids".to_string(),
        Operation::Aids => "aids".to_string(),
        Operation::Description => "description".to_string(),
    };
    Ok(Some(segment))
}

fn validate(query: &Query) -> Result<(), PubChemError> {
    let identifier = &query.identifier;
    if identifier.is_empty() {
        return Err(precondition(format!(
            "empty {} identifier",
            identifier.namespace()
        )));
    }
    if !identifier.valid_for(query.domain) {
        return Err(precondition(format!(
            "namespace {} is not valid for the {} domain",
            identifier.namespace(),
            query.domain
        )));
    }

    let search_type = query.search_type();
    if search_type != SearchType::Exact {
        let target_ok = match identifier {
            Identifier::Smiles(_) | Identifier::Inchi(_) | Identifier::Sdf(_) => true,
            Identifier::Cid(ids) => ids.len() == 1,
            _ => false,
        };
        if query.domain != Domain::Compound || !target_ok {
            return Err(precondition(format!(
                "{:?} search needs a compound SMILES, InChI, SDF or single CID",
                search_type
            )));
        }
    }

    match (&query.operation, query.domain) {
        (Operation::Property(_), Domain::Substance | Domain::Assay) => {
            return Err(precondition("properties are only available for compounds"));
        }
        (Operation::Description, Domain::Compound | Domain::Substance) => {
            return Err(precondition("descriptions are only available for assays"));
        }
        (Operation::Synonyms, Domain::Assay) => {
            return Err(precondition("synonyms are not available for assays"));
        }
        _ => {}
    }

    if matches!(query.output, OutputFormat::Png | OutputFormat::Sdf)
        && query.operation != Operation::Record
    {
        return Err(precondition(format!(
            "{} output is only available for full records",
            query.output.as_str()
        )));
    }

    if query.pagination.is_set()
        && !query.is_async()
        && !matches!(identifier, Identifier::ListKey(_))
    {
        return Err(precondition(
            "pagination only applies to formula, structure search and list-key queries",
        ));
    }
    if query.pagination.count == Some(0) {
        return Err(precondition("page count must be positive"));
    }

    Ok(())
}

/// Build the initiating request for a query
///
/// Fails with [`PubChemError::Precondition`] before any I/O when the query is
/// not something the service could answer.
pub fn build_request(query: &Query) -> Result<ProtocolRequest, PubChemError> {
    validate(query)?;

    let identifier = &query.identifier;
    let mut segments: Vec<String> = vec![query.domain.as_str().to_string()];

    if let Some(search) = query.search_type().segment() {
        segments.push(search.to_string());
    }

    match identifier {
        Identifier::Xref { kind, .. } => {
            segments.push("xref".to_string());
            segments.push(kind.as_str().to_string());
        }
        Identifier::SourceId { source, .. } => {
            segments.push("sourceid".to_string());
            segments.push(urlencoding::encode(&source.replace('/', ".")).into_owned());
        }
        other => segments.push(other.namespace().to_string()),
    }

    let value = identifier.value();
    let encoded = match identifier {
        // numeric lists stay readable
        Identifier::Cid(_) | Identifier::Sid(_) | Identifier::Aid(_) => value.clone(),
        _ => urlencoding::encode(&value).into_owned(),
    };

    let use_form = !identifier.requires_path()
        && (identifier.is_line_notation() || encoded.len() > MAX_PATH_IDENTIFIER_LEN);

    let mut form = None;
    if use_form {
        form = Some(vec![(identifier.namespace().to_string(), value)]);
    } else {
        segments.push(encoded);
    }

    if let Some(operation) = operation_segment(&query.operation)? {
        segments.push(operation);
    }
    segments.push(query.output.as_str().to_string());

    let mut params: Vec<(String, String)> = Vec::new();
    if let Some(search) = &query.search {
        params.extend(search.options.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Identifier::ListKey(_) = identifier {
        if let Some(start) = query.pagination.start {
            params.push(("listkey_start".to_string(), start.to_string()));
        }
        if let Some(count) = query.pagination.count {
            params.push(("listkey_count".to_string(), count.to_string()));
        }
    }
    params.extend(query.options.iter().map(|(k, v)| (k.clone(), v.clone())));

    Ok(ProtocolRequest {
        method: if form.is_some() { Method::POST } else { Method::GET },
        path: segments.join("/"),
        params,
        form,
    })
}

/// Fetch one page of an existing list key
pub fn build_listkey_request(
    domain: Domain,
    list_key: &str,
    operation: &Operation,
    output: OutputFormat,
    window: PageWindow,
    options: &BTreeMap<String, String>,
) -> Result<ProtocolRequest, PubChemError> {
    if list_key.trim().is_empty() {
        return Err(precondition("empty list key"));
    }

    let mut segments = vec![
        domain.as_str().to_string(),
        "listkey".to_string(),
        urlencoding::encode(list_key).into_owned(),
    ];
    if let Some(operation) = operation_segment(operation)? {
        segments.push(operation);
    }
    segments.push(output.as_str().to_string());

    let mut request = ProtocolRequest::get(segments.join("/"));
    request.params = vec![
        ("listkey_start".to_string(), window.start.to_string()),
        ("listkey_count".to_string(), window.count.to_string()),
    ];
    request
        .params
        .extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(request)
}

/// List the depositors for a domain
pub fn build_sources_request(domain: Domain) -> Result<ProtocolRequest, PubChemError> {
    if domain == Domain::Compound {
        return Err(precondition("sources are listed for substances and assays"));
    }
    Ok(ProtocolRequest::get(format!("sources/{}/JSON", domain.as_str())))
}
