//! BioAssay descriptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::RecordError;

/// Funding program or origin of an assay deposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectCategory {
    Mlscn,
    Mlpcn,
    MlscnAp,
    MlpcnAp,
    JournalArticle,
    AssayVendor,
    LiteratureExtracted,
    LiteratureAuthor,
    LiteraturePublisher,
    Rnaigi,
    Other,
}

impl ProjectCategory {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ProjectCategory::Mlscn,
            2 => ProjectCategory::Mlpcn,
            3 => ProjectCategory::MlscnAp,
            4 => ProjectCategory::MlpcnAp,
            5 => ProjectCategory::JournalArticle,
            6 => ProjectCategory::AssayVendor,
            7 => ProjectCategory::LiteratureExtracted,
            8 => ProjectCategory::LiteratureAuthor,
            9 => ProjectCategory::LiteraturePublisher,
            10 => ProjectCategory::Rnaigi,
            _ => ProjectCategory::Other,
        }
    }
}

/// One column of an assay's result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayResultColumn {
    pub tid: u32,
    pub name: String,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(rename = "type", default)]
    pub value_type: Option<i64>,
    #[serde(default)]
    pub unit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawContainer {
    assay: RawAssay,
}

#[derive(Debug, Deserialize)]
struct RawAssay {
    descr: RawDescr,
}

#[derive(Debug, Deserialize)]
struct RawDescr {
    aid: RawAid,
    name: String,
    #[serde(default)]
    description: Vec<String>,
    #[serde(default)]
    comment: Vec<String>,
    #[serde(default)]
    results: Vec<AssayResultColumn>,
    #[serde(default)]
    target: Option<Vec<Value>>,
    #[serde(default)]
    revision: Option<i64>,
    #[serde(default)]
    project_category: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawAid {
    id: u64,
    #[serde(default)]
    version: Option<i64>,
}

/// A single record from the PubChem BioAssay database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assay {
    aid: u64,
    aid_version: Option<i64>,
    name: String,
    description: Vec<String>,
    comments: Vec<String>,
    results: Vec<AssayResultColumn>,
    targets: Option<Vec<Value>>,
    revision: Option<i64>,
    project_category: Option<ProjectCategory>,
    #[serde(skip)]
    record: Value,
}

impl Assay {
    /// Decode one entry of `PC_AssayContainer`
    pub fn from_record(record: &Value) -> Result<Self, RecordError> {
        let raw: RawContainer = serde_json::from_value(record.clone())
            .map_err(|e| RecordError::malformed("assay", e))?;
        let descr = raw.assay.descr;

        Ok(Self {
            aid: descr.aid.id,
            aid_version: descr.aid.version,
            name: descr.name,
            description: descr.description,
            comments: descr.comment.into_iter().filter(|c| !c.is_empty()).collect(),
            results: descr.results,
            targets: descr.target,
            revision: descr.revision,
            project_category: descr.project_category.map(ProjectCategory::from_code),
            record: record.clone(),
        })
    }

    pub fn aid(&self) -> u64 {
        self.aid
    }

    /// Incremented when the depositor updates the record
    pub fn aid_version(&self) -> Option<i64> {
        self.aid_version
    }

    /// Short display name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &[String] {
        &self.description
    }

    /// Non-empty comment lines
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn results(&self) -> &[AssayResultColumn] {
        &self.results
    }

    pub fn targets(&self) -> Option<&[Value]> {
        self.targets.as_deref()
    }

    pub fn revision(&self) -> Option<i64> {
        self.revision
    }

    pub fn project_category(&self) -> Option<ProjectCategory> {
        self.project_category
    }

    pub fn record(&self) -> &Value {
        &self.record
    }
}

impl fmt::Display for Assay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Assay({})", self.aid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_assay_description() {
        let record = json!({
            "assay": {"descr": {
                "aid": {"id": 1000, "version": 1},
                "name": "qHTS for Inhibitors of binding",
                "description": ["line one", "line two"],
                "comment": ["", "NIH Molecular Libraries"],
                "results": [{"tid": 1, "name": "Phenotype", "description": ["Indicates type"], "type": 4}],
                "revision": 1,
                "project_category": 2
            }}
        });
        let assay = Assay::from_record(&record).unwrap();

        assert_eq!(assay.aid(), 1000);
        assert_eq!(assay.aid_version(), Some(1));
        assert_eq!(assay.comments(), ["NIH Molecular Libraries".to_string()]);
        assert_eq!(assay.results()[0].name, "Phenotype");
        assert_eq!(assay.project_category(), Some(ProjectCategory::Mlpcn));
        assert!(assay.targets().is_none());
        assert_eq!(assay.to_string(), "Assay(1000)");
    }

    #[test]
    fn test_missing_description_is_error() {
        assert!(Assay::from_record(&json!({"assay": {}})).is_err());
    }
}
