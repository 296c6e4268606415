//! Known PubChem property tags, property values and property-table rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declared value type of a property tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Text,
    Float,
    Integer,
    List,
}

macro_rules! property_tags {
    ($($variant:ident => ($server:literal, $snake:literal, $ty:ident)),+ $(,)?) => {
        /// Property names understood by the `property` operation
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum PropertyTag {
            $($variant),+
        }

        impl PropertyTag {
            /// Every known tag, in the service's documented order
            pub const ALL: &'static [PropertyTag] = &[$(PropertyTag::$variant),+];

            /// Name used on the wire
            pub fn server_name(&self) -> &'static str {
                match self {
                    $(PropertyTag::$variant => $server),+
                }
            }

            /// snake_case alias accepted when building requests
            pub fn snake_name(&self) -> &'static str {
                match self {
                    $(PropertyTag::$variant => $snake),+
                }
            }

            pub fn value_type(&self) -> ValueType {
                match self {
                    $(PropertyTag::$variant => ValueType::$ty),+
                }
            }
        }
    };
}

property_tags! {
    MolecularFormula => ("MolecularFormula", "molecular_formula", Text),
    MolecularWeight => ("MolecularWeight", "molecular_weight", Float),
    Smiles => ("SMILES", "smiles", Text),
    ConnectivitySmiles => ("ConnectivitySMILES", "connectivity_smiles", Text),
    CanonicalSmiles => ("CanonicalSMILES", "canonical_smiles", Text),
    IsomericSmiles => ("IsomericSMILES", "isomeric_smiles", Text),
    Inchi => ("InChI", "inchi", Text),
    InchiKey => ("InChIKey", "inchikey", Text),
    IupacName => ("IUPACName", "iupac_name", Text),
    Title => ("Title", "title", Text),
    XLogP => ("XLogP", "xlogp", Float),
    ExactMass => ("ExactMass", "exact_mass", Float),
    MonoisotopicMass => ("MonoisotopicMass", "monoisotopic_mass", Float),
    Tpsa => ("TPSA", "tpsa", Float),
    Complexity => ("Complexity", "complexity", Float),
    Charge => ("Charge", "charge", Integer),
    HBondDonorCount => ("HBondDonorCount", "h_bond_donor_count", Integer),
    HBondAcceptorCount => ("HBondAcceptorCount", "h_bond_acceptor_count", Integer),
    RotatableBondCount => ("RotatableBondCount", "rotatable_bond_count", Integer),
    HeavyAtomCount => ("HeavyAtomCount", "heavy_atom_count", Integer),
    IsotopeAtomCount => ("IsotopeAtomCount", "isotope_atom_count", Integer),
    AtomStereoCount => ("AtomStereoCount", "atom_stereo_count", Integer),
    DefinedAtomStereoCount => ("DefinedAtomStereoCount", "defined_atom_stereo_count", Integer),
    UndefinedAtomStereoCount => ("UndefinedAtomStereoCount", "undefined_atom_stereo_count", Integer),
    BondStereoCount => ("BondStereoCount", "bond_stereo_count", Integer),
    DefinedBondStereoCount => ("DefinedBondStereoCount", "defined_bond_stereo_count", Integer),
    UndefinedBondStereoCount => ("UndefinedBondStereoCount", "undefined_bond_stereo_count", Integer),
    CovalentUnitCount => ("CovalentUnitCount", "covalent_unit_count", Integer),
    PatentCount => ("PatentCount", "patent_count", Integer),
    PatentFamilyCount => ("PatentFamilyCount", "patent_family_count", Integer),
    LiteratureCount => ("LiteratureCount", "literature_count", Integer),
    Volume3D => ("Volume3D", "volume_3d", Float),
    XStericQuadrupole3D => ("XStericQuadrupole3D", "x_steric_quadrupole_3d", Float),
    YStericQuadrupole3D => ("YStericQuadrupole3D", "y_steric_quadrupole_3d", Float),
    ZStericQuadrupole3D => ("ZStericQuadrupole3D", "z_steric_quadrupole_3d", Float),
    FeatureCount3D => ("FeatureCount3D", "feature_count_3d", Integer),
    FeatureAcceptorCount3D => ("FeatureAcceptorCount3D", "feature_acceptor_count_3d", Integer),
    FeatureDonorCount3D => ("FeatureDonorCount3D", "feature_donor_count_3d", Integer),
    FeatureAnionCount3D => ("FeatureAnionCount3D", "feature_anion_count_3d", Integer),
    FeatureCationCount3D => ("FeatureCationCount3D", "feature_cation_count_3d", Integer),
    FeatureRingCount3D => ("FeatureRingCount3D", "feature_ring_count_3d", Integer),
    FeatureHydrophobeCount3D => ("FeatureHydrophobeCount3D", "feature_hydrophobe_count_3d", Integer),
    ConformerModelRmsd3D => ("ConformerModelRMSD3D", "conformer_model_rmsd_3d", Float),
    EffectiveRotorCount3D => ("EffectiveRotorCount3D", "effective_rotor_count_3d", Float),
    ConformerCount3D => ("ConformerCount3D", "conformer_count_3d", Integer),
    Fingerprint2D => ("Fingerprint2D", "fingerprint_2d", Text),
}

impl PropertyTag {
    /// Resolve a server name, snake_case alias or natural name ("molecular weight")
    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if let Some(tag) = Self::ALL.iter().find(|t| t.server_name() == trimmed) {
            return Some(*tag);
        }

        let snake = trimmed.to_lowercase().replace([' ', '-'], "_");
        // Older alias kept by the service for the conformer RMSD
        if snake == "conformer_rmsd_3d" {
            return Some(PropertyTag::ConformerModelRmsd3D);
        }
        Self::ALL
            .iter()
            .find(|t| t.snake_name() == snake || t.server_name().eq_ignore_ascii_case(trimmed))
            .copied()
    }

    /// Only computed for 3-D conformer models
    pub fn is_3d(&self) -> bool {
        self.server_name().ends_with("3D")
    }
}

impl fmt::Display for PropertyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.server_name())
    }
}

/// Map a requested property name onto the server's tag name; unknown names pass through
pub fn normalize_property_name(name: &str) -> String {
    match PropertyTag::from_name(name) {
        Some(tag) => tag.server_name().to_string(),
        None => name.trim().to_string(),
    }
}

/// A decoded property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Float(f64),
    Text(String),
    IntegerList(Vec<i64>),
    FloatList(Vec<f64>),
    TextList(Vec<String>),
    Other(Value),
}

impl PropertyValue {
    /// Decode a record value object such as `{"sval": "..."}` or `{"fvec": [...]}`
    pub fn from_record_value(value: &Value) -> Self {
        let Some((key, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
            return PropertyValue::Other(value.clone());
        };
        let decoded = match key.as_str() {
            "sval" | "binary" => inner.as_str().map(|s| PropertyValue::Text(s.to_string())),
            "ival" => inner.as_i64().map(PropertyValue::Integer),
            "fval" => inner.as_f64().map(PropertyValue::Float),
            "slist" => serde_json::from_value(inner.clone())
                .ok()
                .map(PropertyValue::TextList),
            "ivec" => serde_json::from_value(inner.clone())
                .ok()
                .map(PropertyValue::IntegerList),
            "fvec" => serde_json::from_value(inner.clone())
                .ok()
                .map(PropertyValue::FloatList),
            _ => None,
        };
        decoded.unwrap_or_else(|| PropertyValue::Other(inner.clone()))
    }

    /// Decode a plain JSON value from a property table
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => PropertyValue::Text(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Integer(i),
                None => n
                    .as_f64()
                    .map(PropertyValue::Float)
                    .unwrap_or_else(|| PropertyValue::Other(value.clone())),
            },
            other => PropertyValue::Other(other.clone()),
        }
    }

    /// Coerce to the declared type of a tag; the service sends some floats as strings
    pub fn coerce(self, value_type: ValueType) -> Self {
        match (value_type, self) {
            (ValueType::Float, PropertyValue::Text(s)) => match s.trim().parse::<f64>() {
                Ok(f) => PropertyValue::Float(f),
                Err(_) => PropertyValue::Text(s),
            },
            (ValueType::Float, PropertyValue::Integer(i)) => PropertyValue::Float(i as f64),
            (ValueType::Integer, PropertyValue::Text(s)) => match s.trim().parse::<i64>() {
                Ok(i) => PropertyValue::Integer(i),
                Err(_) => PropertyValue::Text(s),
            },
            (ValueType::Integer, PropertyValue::Float(f)) if f.fract() == 0.0 => {
                PropertyValue::Integer(f as i64)
            }
            (ValueType::Text, PropertyValue::Integer(i)) => PropertyValue::Text(i.to_string()),
            (_, value) => value,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// One row of a property table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyRow {
    pub cid: Option<u64>,
    pub values: BTreeMap<PropertyTag, PropertyValue>,
    /// Columns the client has no tag for, kept verbatim
    pub extra: BTreeMap<String, Value>,
}

impl PropertyRow {
    pub fn from_json(row: &serde_json::Map<String, Value>) -> Self {
        let mut cid = None;
        let mut values = BTreeMap::new();
        let mut extra = BTreeMap::new();

        for (key, value) in row {
            if key == "CID" {
                cid = value.as_u64();
                continue;
            }
            match PropertyTag::ALL.iter().find(|t| t.server_name() == key) {
                Some(tag) => {
                    values.insert(
                        *tag,
                        PropertyValue::from_json(value).coerce(tag.value_type()),
                    );
                }
                None => {
                    extra.insert(key.clone(), value.clone());
                }
            }
        }

        Self { cid, values, extra }
    }

    /// Absent when the server did not return the column
    pub fn get(&self, tag: PropertyTag) -> Option<&PropertyValue> {
        self.values.get(&tag)
    }

    /// Look up by any accepted name, falling back to the opaque columns
    pub fn get_by_name(&self, name: &str) -> Option<PropertyValue> {
        match PropertyTag::from_name(name) {
            Some(tag) => self.get(tag).cloned(),
            None => self.extra.get(name).map(PropertyValue::from_json),
        }
    }
}

/// Synonyms for one input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymSet {
    pub cid: Option<u64>,
    pub sid: Option<u64>,
    pub synonyms: Vec<String>,
}
