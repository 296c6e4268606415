//! Structured query model: what to ask PubChem, before it becomes a URL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Record domain of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Compound,
    Substance,
    Assay,
}

impl Domain {
    /// Path segment used by PUG REST
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Compound => "compound",
            Domain::Substance => "substance",
            Domain::Assay => "assay",
        }
    }

    /// JSON container key wrapping full records of this domain
    pub fn container_key(&self) -> &'static str {
        match self {
            Domain::Compound => "PC_Compounds",
            Domain::Substance => "PC_Substances",
            Domain::Assay => "PC_AssayContainer",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-reference identifier kinds accepted by the `xref` namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XrefKind {
    RegistryId,
    Rn,
    PubMedId,
    MmdbId,
    ProteinGi,
    NucleotideGi,
    TaxonomyId,
    MimId,
    GeneId,
    ProbeId,
    PatentId,
}

impl XrefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            XrefKind::RegistryId => "RegistryID",
            XrefKind::Rn => "RN",
            XrefKind::PubMedId => "PubMedID",
            XrefKind::MmdbId => "MMDBID",
            XrefKind::ProteinGi => "ProteinGI",
            XrefKind::NucleotideGi => "NucleotideGI",
            XrefKind::TaxonomyId => "TaxonomyID",
            XrefKind::MimId => "MIMID",
            XrefKind::GeneId => "GeneID",
            XrefKind::ProbeId => "ProbeID",
            XrefKind::PatentId => "PatentID",
        }
    }
}

/// The input half of a request: which records to start from
///
/// Numeric identifiers may be batched; order and duplicates are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "namespace", content = "value", rename_all = "lowercase")]
pub enum Identifier {
    Cid(Vec<u64>),
    Sid(Vec<u64>),
    Aid(Vec<u64>),
    Name(String),
    Smiles(String),
    Inchi(String),
    InchiKey(String),
    Sdf(String),
    Formula(String),
    Xref { kind: XrefKind, value: String },
    SourceId { source: String, id: String },
    ListKey(String),
}

impl Identifier {
    pub fn cid(cid: u64) -> Self {
        Identifier::Cid(vec![cid])
    }

    pub fn cids(cids: impl IntoIterator<Item = u64>) -> Self {
        Identifier::Cid(cids.into_iter().collect())
    }

    pub fn sid(sid: u64) -> Self {
        Identifier::Sid(vec![sid])
    }

    pub fn aid(aid: u64) -> Self {
        Identifier::Aid(vec![aid])
    }

    pub fn name(name: impl Into<String>) -> Self {
        Identifier::Name(name.into())
    }

    pub fn smiles(smiles: impl Into<String>) -> Self {
        Identifier::Smiles(smiles.into())
    }

    pub fn inchi(inchi: impl Into<String>) -> Self {
        Identifier::Inchi(inchi.into())
    }

    pub fn inchikey(key: impl Into<String>) -> Self {
        Identifier::InchiKey(key.into())
    }

    pub fn formula(formula: impl Into<String>) -> Self {
        Identifier::Formula(formula.into())
    }

    pub fn xref(kind: XrefKind, value: impl Into<String>) -> Self {
        Identifier::Xref {
            kind,
            value: value.into(),
        }
    }

    pub fn source_id(source: impl Into<String>, id: impl Into<String>) -> Self {
        Identifier::SourceId {
            source: source.into(),
            id: id.into(),
        }
    }

    /// Form-body key and primary namespace name
    pub fn namespace(&self) -> &'static str {
        match self {
            Identifier::Cid(_) => "cid",
            Identifier::Sid(_) => "sid",
            Identifier::Aid(_) => "aid",
            Identifier::Name(_) => "name",
            Identifier::Smiles(_) => "smiles",
            Identifier::Inchi(_) => "inchi",
            Identifier::InchiKey(_) => "inchikey",
            Identifier::Sdf(_) => "sdf",
            Identifier::Formula(_) => "formula",
            Identifier::Xref { .. } => "xref",
            Identifier::SourceId { .. } => "sourceid",
            Identifier::ListKey(_) => "listkey",
        }
    }

    /// Identifier value as it is sent to the service (numeric lists comma-joined)
    pub fn value(&self) -> String {
        match self {
            Identifier::Cid(ids) | Identifier::Sid(ids) | Identifier::Aid(ids) => ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(","),
            Identifier::Name(v)
            | Identifier::Smiles(v)
            | Identifier::Inchi(v)
            | Identifier::InchiKey(v)
            | Identifier::Sdf(v)
            | Identifier::Formula(v)
            | Identifier::ListKey(v) => v.clone(),
            Identifier::Xref { value, .. } => value.clone(),
            Identifier::SourceId { id, .. } => id.clone(),
        }
    }

    /// Whether no usable value was supplied
    pub fn is_empty(&self) -> bool {
        match self {
            Identifier::Cid(ids) | Identifier::Sid(ids) | Identifier::Aid(ids) => ids.is_empty(),
            Identifier::SourceId { source, id } => source.trim().is_empty() || id.trim().is_empty(),
            _ => self.value().trim().is_empty(),
        }
    }

    /// Line notations and structure files travel in a form body rather than the path
    pub fn is_line_notation(&self) -> bool {
        matches!(
            self,
            Identifier::Smiles(_) | Identifier::Inchi(_) | Identifier::Sdf(_)
        )
    }

    /// Namespaces whose value must stay in the URL path
    pub fn requires_path(&self) -> bool {
        matches!(
            self,
            Identifier::Formula(_)
                | Identifier::Xref { .. }
                | Identifier::SourceId { .. }
                | Identifier::ListKey(_)
        )
    }

    /// Namespaces valid for a domain
    pub fn valid_for(&self, domain: Domain) -> bool {
        match domain {
            Domain::Compound => matches!(
                self,
                Identifier::Cid(_)
                    | Identifier::Name(_)
                    | Identifier::Smiles(_)
                    | Identifier::Inchi(_)
                    | Identifier::InchiKey(_)
                    | Identifier::Sdf(_)
                    | Identifier::Formula(_)
                    | Identifier::Xref { .. }
                    | Identifier::ListKey(_)
            ),
            Domain::Substance => matches!(
                self,
                Identifier::Sid(_)
                    | Identifier::Name(_)
                    | Identifier::SourceId { .. }
                    | Identifier::Xref { .. }
                    | Identifier::ListKey(_)
            ),
            Domain::Assay => matches!(self, Identifier::Aid(_) | Identifier::ListKey(_)),
        }
    }
}

/// Structure search kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Exact,
    Substructure,
    Superstructure,
    Similarity,
    Identity,
}

impl SearchType {
    /// Path segment, absent for exact lookups
    pub fn segment(&self) -> Option<&'static str> {
        match self {
            SearchType::Exact => None,
            SearchType::Substructure => Some("substructure"),
            SearchType::Superstructure => Some("superstructure"),
            SearchType::Similarity => Some("similarity"),
            SearchType::Identity => Some("identity"),
        }
    }

    /// Everything but exact lookups is answered with a list key
    pub fn is_async(&self) -> bool {
        !matches!(self, SearchType::Exact)
    }
}

/// Search kind plus free-form service options (e.g. `Threshold`, `MatchIsotopes`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub search_type: SearchType,
    pub options: BTreeMap<String, String>,
}

impl SearchSpec {
    pub fn new(search_type: SearchType) -> Self {
        Self {
            search_type,
            options: BTreeMap::new(),
        }
    }

    pub fn substructure() -> Self {
        Self::new(SearchType::Substructure)
    }

    pub fn superstructure() -> Self {
        Self::new(SearchType::Superstructure)
    }

    pub fn identity() -> Self {
        Self::new(SearchType::Identity)
    }

    /// Similarity search; the threshold is a Tanimoto percentage
    pub fn similarity(threshold: u8) -> Self {
        Self::new(SearchType::Similarity).option("Threshold", threshold.to_string())
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Result window for list-key backed queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub count: Option<u32>,
    pub start: Option<u32>,
}

impl Pagination {
    pub fn is_set(&self) -> bool {
        self.count.is_some() || self.start.is_some()
    }
}

/// What to do with the selected records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// The full record
    #[default]
    Record,
    /// A property table for the given tags (names are normalized when the request is built)
    Property(Vec<String>),
    Synonyms,
    Cids,
    Sids,
    Aids,
    /// Assay description
    Description,
}

impl Operation {
    pub fn property<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Operation::Property(tags.into_iter().map(Into::into).collect())
    }
}

/// Output format segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    #[default]
    Json,
    Xml,
    Asnt,
    Asnb,
    Sdf,
    Csv,
    Png,
    Txt,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "JSON",
            OutputFormat::Xml => "XML",
            OutputFormat::Asnt => "ASNT",
            OutputFormat::Asnb => "ASNB",
            OutputFormat::Sdf => "SDF",
            OutputFormat::Csv => "CSV",
            OutputFormat::Png => "PNG",
            OutputFormat::Txt => "TXT",
        }
    }

    /// File extension used when saving this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
            OutputFormat::Asnt => "asn",
            OutputFormat::Asnb => "asnb",
            OutputFormat::Sdf => "sdf",
            OutputFormat::Csv => "csv",
            OutputFormat::Png => "png",
            OutputFormat::Txt => "txt",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "JSON" => Ok(OutputFormat::Json),
            "XML" => Ok(OutputFormat::Xml),
            "ASNT" => Ok(OutputFormat::Asnt),
            "ASNB" => Ok(OutputFormat::Asnb),
            "SDF" => Ok(OutputFormat::Sdf),
            "CSV" => Ok(OutputFormat::Csv),
            "PNG" => Ok(OutputFormat::Png),
            "TXT" => Ok(OutputFormat::Txt),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// A complete structured request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub domain: Domain,
    pub identifier: Identifier,
    pub operation: Operation,
    pub search: Option<SearchSpec>,
    pub pagination: Pagination,
    pub output: OutputFormat,
    /// Extra query-string options (e.g. `image_size`, `record_type`)
    pub options: BTreeMap<String, String>,
}

impl Query {
    pub fn new(domain: Domain, identifier: Identifier) -> Self {
        Self {
            domain,
            identifier,
            operation: Operation::Record,
            search: None,
            pagination: Pagination::default(),
            output: OutputFormat::Json,
            options: BTreeMap::new(),
        }
    }

    pub fn compound(identifier: Identifier) -> Self {
        Self::new(Domain::Compound, identifier)
    }

    pub fn substance(identifier: Identifier) -> Self {
        Self::new(Domain::Substance, identifier)
    }

    pub fn assay(identifier: Identifier) -> Self {
        Self::new(Domain::Assay, identifier)
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn search(mut self, search: SearchSpec) -> Self {
        self.search = Some(search);
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.pagination.count = Some(count);
        self
    }

    pub fn start(mut self, start: u32) -> Self {
        self.pagination.start = Some(start);
        self
    }

    pub fn output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Ask for 3-D conformer records instead of 2-D depictions
    pub fn record_type_3d(self) -> Self {
        self.option("record_type", "3d")
    }

    /// PNG image size, either `small`, `large` or `<w>x<h>`
    pub fn image_size(self, size: impl Into<String>) -> Self {
        self.option("image_size", size)
    }

    pub fn search_type(&self) -> SearchType {
        self.search
            .as_ref()
            .map(|s| s.search_type)
            .unwrap_or_default()
    }

    /// Whether the service answers this query with a list key
    pub fn is_async(&self) -> bool {
        self.search_type().is_async() || matches!(self.identifier, Identifier::Formula(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_value_preserves_order_and_duplicates() {
        let id = Identifier::cids([5, 1, 5]);
        assert_eq!(id.value(), "5,1,5");
        assert_eq!(id.namespace(), "cid");
    }

    #[test]
    fn test_identifier_is_empty() {
        assert!(Identifier::Cid(vec![]).is_empty());
        assert!(Identifier::name("   ").is_empty());
        assert!(Identifier::source_id("", "123").is_empty());
        assert!(!Identifier::name("aspirin").is_empty());
    }

    #[test]
    fn test_identifier_domain_validity() {
        assert!(Identifier::cid(1).valid_for(Domain::Compound));
        assert!(!Identifier::cid(1).valid_for(Domain::Substance));
        assert!(Identifier::source_id("DTP/NCI", "747285").valid_for(Domain::Substance));
        assert!(!Identifier::smiles("CCO").valid_for(Domain::Assay));
    }

    #[test]
    fn test_query_is_async() {
        assert!(!Query::compound(Identifier::name("benzene")).is_async());
        assert!(Query::compound(Identifier::formula("C10H21N")).is_async());
        assert!(Query::compound(Identifier::smiles("CC"))
            .search(SearchSpec::superstructure())
            .is_async());
    }

    #[test]
    fn test_similarity_threshold_option() {
        let spec = SearchSpec::similarity(95);
        assert_eq!(spec.search_type, SearchType::Similarity);
        assert_eq!(spec.options.get("Threshold").map(String::as_str), Some("95"));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("sdf".parse::<OutputFormat>(), Ok(OutputFormat::Sdf));
        assert!("docx".parse::<OutputFormat>().is_err());
    }
}
