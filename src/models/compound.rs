//! Compound records: atoms, bonds, coordinates and the computed property bag.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::fingerprint::{Fingerprint, FingerprintError};
use super::property::{PropertyTag, PropertyValue};
use super::RecordError;

/// Element symbols indexed by atomic number
const ELEMENTS: [&str; 119] = [
    "", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Element symbol for an atomic number, including PubChem's special atom codes
pub fn element_symbol(number: u32) -> Option<&'static str> {
    match number {
        1..=118 => Some(ELEMENTS[number as usize]),
        252 => Some("Lp"),
        253 => Some("R"),
        254 | 255 => Some("*"),
        _ => None,
    }
}

/// Dimensionality of a record's coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateType {
    #[serde(rename = "2d")]
    TwoD,
    #[serde(rename = "3d")]
    ThreeD,
}

impl fmt::Display for CoordinateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateType::TwoD => f.write_str("2d"),
            CoordinateType::ThreeD => f.write_str("3d"),
        }
    }
}

/// Bond order codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondType {
    Single,
    Double,
    Triple,
    Quadruple,
    Dative,
    Complex,
    Ionic,
    Unknown,
}

impl BondType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => BondType::Single,
            2 => BondType::Double,
            3 => BondType::Triple,
            4 => BondType::Quadruple,
            5 => BondType::Dative,
            6 => BondType::Complex,
            7 => BondType::Ionic,
            _ => BondType::Unknown,
        }
    }
}

/// Which form of a compound a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompoundIdType {
    Deposited,
    Standardized,
    Component,
    Neutralized,
    Mixture,
    Tautomer,
    Ionized,
    Unknown,
}

impl CompoundIdType {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => CompoundIdType::Deposited,
            1 => CompoundIdType::Standardized,
            2 => CompoundIdType::Component,
            3 => CompoundIdType::Neutralized,
            4 => CompoundIdType::Mixture,
            5 => CompoundIdType::Tautomer,
            6 => CompoundIdType::Ionized,
            _ => CompoundIdType::Unknown,
        }
    }
}

/// An atom within a compound
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Atom {
    pub aid: u32,
    /// Atomic number
    pub number: u32,
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// Absent in 2-D records
    pub z: Option<f64>,
    /// Formal charge
    pub charge: i32,
}

impl Atom {
    pub fn element(&self) -> String {
        element_symbol(self.number)
            .map(str::to_string)
            .unwrap_or_else(|| self.number.to_string())
    }

    pub fn coordinate_type(&self) -> CoordinateType {
        if self.z.is_some() {
            CoordinateType::ThreeD
        } else {
            CoordinateType::TwoD
        }
    }
}

/// A bond between two atoms
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bond {
    pub aid1: u32,
    pub aid2: u32,
    pub order: BondType,
    /// Drawing annotation code (wedge, hash, ...)
    pub style: Option<i64>,
}

// Raw record layout as served in `PC_Compounds`.

#[derive(Debug, Deserialize)]
struct RawCompound {
    #[serde(default)]
    id: Option<RawCompoundId>,
    #[serde(default)]
    atoms: Option<RawAtoms>,
    #[serde(default)]
    bonds: Option<RawBonds>,
    #[serde(default)]
    coords: Vec<RawCoords>,
    #[serde(default)]
    charge: Option<i32>,
    #[serde(default)]
    props: Vec<RawProp>,
    #[serde(default)]
    count: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawCompoundId {
    #[serde(rename = "type", default)]
    id_type: Option<i64>,
    #[serde(default)]
    id: Option<RawCid>,
}

#[derive(Debug, Deserialize)]
struct RawCid {
    #[serde(default)]
    cid: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawAtoms {
    aid: Vec<u32>,
    element: Vec<u32>,
    #[serde(default)]
    charge: Vec<RawCharge>,
}

#[derive(Debug, Deserialize)]
struct RawCharge {
    aid: u32,
    value: i32,
}

#[derive(Debug, Deserialize)]
struct RawBonds {
    aid1: Vec<u32>,
    aid2: Vec<u32>,
    order: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct RawCoords {
    #[serde(rename = "type", default)]
    coord_type: Vec<i64>,
    aid: Vec<u32>,
    #[serde(default)]
    conformers: Vec<RawConformer>,
    #[serde(default)]
    data: Vec<RawProp>,
}

#[derive(Debug, Deserialize)]
struct RawConformer {
    x: Vec<f64>,
    y: Vec<f64>,
    #[serde(default)]
    z: Option<Vec<f64>>,
    #[serde(default)]
    style: Option<RawStyle>,
    #[serde(default)]
    data: Vec<RawProp>,
}

#[derive(Debug, Deserialize)]
struct RawStyle {
    annotation: Vec<i64>,
    aid1: Vec<u32>,
    aid2: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct RawProp {
    urn: RawUrn,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct RawUrn {
    label: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    implementation: Option<String>,
}

/// Where a record property lands after decoding
enum PropSlot {
    Tag(PropertyTag),
    Fingerprint,
    Descriptor(String),
}

fn slot_for(urn: &RawUrn) -> PropSlot {
    match urn.implementation.as_deref() {
        Some("E_TPSA") => return PropSlot::Tag(PropertyTag::Tpsa),
        Some("E_COMPLEXITY") => return PropSlot::Tag(PropertyTag::Complexity),
        Some("E_NHDONORS") => return PropSlot::Tag(PropertyTag::HBondDonorCount),
        Some("E_NHACCEPTORS") => return PropSlot::Tag(PropertyTag::HBondAcceptorCount),
        Some("E_NROTBONDS") => return PropSlot::Tag(PropertyTag::RotatableBondCount),
        Some("E_SCREEN") => return PropSlot::Fingerprint,
        _ => {}
    }

    let tag = match (urn.label.as_str(), urn.name.as_deref()) {
        ("Molecular Formula", _) => Some(PropertyTag::MolecularFormula),
        ("Molecular Weight", _) => Some(PropertyTag::MolecularWeight),
        ("SMILES", Some("Absolute")) => Some(PropertyTag::Smiles),
        ("SMILES", Some("Connectivity")) => Some(PropertyTag::ConnectivitySmiles),
        ("SMILES", Some("Canonical")) => Some(PropertyTag::CanonicalSmiles),
        ("SMILES", Some("Isomeric")) => Some(PropertyTag::IsomericSmiles),
        ("InChI", Some("Standard")) => Some(PropertyTag::Inchi),
        ("InChIKey", Some("Standard")) => Some(PropertyTag::InchiKey),
        ("IUPAC Name", Some("Preferred")) => Some(PropertyTag::IupacName),
        ("Log P", _) => Some(PropertyTag::XLogP),
        ("Mass", Some("Exact")) => Some(PropertyTag::ExactMass),
        ("Weight", Some("MonoIsotopic")) => Some(PropertyTag::MonoisotopicMass),
        ("Count", Some("Effective Rotor")) => Some(PropertyTag::EffectiveRotorCount3D),
        ("Shape", Some("Volume")) => Some(PropertyTag::Volume3D),
        ("Conformer", Some("RMSD")) => Some(PropertyTag::ConformerModelRmsd3D),
        _ => None,
    };

    match tag {
        Some(tag) => PropSlot::Tag(tag),
        None => PropSlot::Descriptor(descriptor_key(&urn.label, urn.name.as_deref())),
    }
}

fn descriptor_key(label: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{} ({})", label, name),
        None => label.to_string(),
    }
}

fn count_tag(key: &str) -> Option<PropertyTag> {
    match key {
        "heavy_atom" => Some(PropertyTag::HeavyAtomCount),
        "isotope_atom" => Some(PropertyTag::IsotopeAtomCount),
        "atom_chiral" => Some(PropertyTag::AtomStereoCount),
        "atom_chiral_def" => Some(PropertyTag::DefinedAtomStereoCount),
        "atom_chiral_undef" => Some(PropertyTag::UndefinedAtomStereoCount),
        "bond_chiral" => Some(PropertyTag::BondStereoCount),
        "bond_chiral_def" => Some(PropertyTag::DefinedBondStereoCount),
        "bond_chiral_undef" => Some(PropertyTag::UndefinedBondStereoCount),
        "covalent_unit" => Some(PropertyTag::CovalentUnitCount),
        _ => None,
    }
}

/// A single record from the PubChem Compound database
///
/// Records are immutable snapshots; every property is decoded when the record
/// is built, and a property the server did not send reads as `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compound {
    cid: Option<u64>,
    id_type: Option<CompoundIdType>,
    coordinate_type: Option<CoordinateType>,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    charge: i32,
    properties: BTreeMap<PropertyTag, PropertyValue>,
    descriptors: BTreeMap<String, PropertyValue>,
    fingerprint: Option<String>,
    #[serde(skip)]
    record: Value,
}

impl Compound {
    /// Decode one entry of `PC_Compounds`
    pub fn from_record(record: &Value) -> Result<Self, RecordError> {
        let raw: RawCompound = serde_json::from_value(record.clone())
            .map_err(|e| RecordError::malformed("compound", e))?;

        let cid = raw.id.as_ref().and_then(|id| id.id.as_ref()).and_then(|id| id.cid);
        let id_type = raw
            .id
            .as_ref()
            .and_then(|id| id.id_type)
            .map(CompoundIdType::from_code);

        let mut atoms = build_atoms(raw.atoms.as_ref())?;
        let mut bonds = build_bonds(raw.bonds.as_ref())?;
        let coordinate_type = apply_coordinates(&raw.coords, &mut atoms, &mut bonds)?;

        atoms.sort_by_key(|a| a.aid);
        bonds.sort_by_key(|b| (b.aid1, b.aid2));

        let mut properties = BTreeMap::new();
        let mut descriptors = BTreeMap::new();
        let mut fingerprint = None;

        let conformer_data = raw
            .coords
            .first()
            .into_iter()
            .flat_map(|c| c.data.iter().chain(c.conformers.first().into_iter().flat_map(|f| f.data.iter())));

        // The first occurrence of a property wins
        for prop in raw.props.iter().chain(conformer_data) {
            let value = PropertyValue::from_record_value(&prop.value);
            match slot_for(&prop.urn) {
                PropSlot::Tag(tag) => {
                    properties
                        .entry(tag)
                        .or_insert_with(|| value.coerce(tag.value_type()));
                }
                PropSlot::Fingerprint => {
                    if fingerprint.is_none() {
                        fingerprint = value.as_str().map(str::to_string);
                    }
                }
                PropSlot::Descriptor(key) => {
                    descriptors.entry(key).or_insert(value);
                }
            }
        }

        for (key, value) in &raw.count {
            let value = PropertyValue::from_json(value);
            match count_tag(key) {
                Some(tag) => {
                    properties.insert(tag, value.coerce(tag.value_type()));
                }
                None => {
                    descriptors.insert(descriptor_key("Count", Some(key)), value);
                }
            }
        }

        let compound = Self {
            cid,
            id_type,
            coordinate_type,
            atoms,
            bonds,
            charge: raw.charge.unwrap_or(0),
            properties,
            descriptors,
            fingerprint,
            record: record.clone(),
        };
        tracing::debug!("Decoded {}", compound);
        Ok(compound)
    }

    /// Missing for records generated on the fly from a structure query
    pub fn cid(&self) -> Option<u64> {
        self.cid
    }

    pub fn id_type(&self) -> Option<CompoundIdType> {
        self.id_type
    }

    /// Dimensionality detected from the coordinates actually present
    pub fn coordinate_type(&self) -> Option<CoordinateType> {
        self.coordinate_type
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn elements(&self) -> Vec<String> {
        self.atoms.iter().map(Atom::element).collect()
    }

    /// Formal charge on the whole compound
    pub fn charge(&self) -> i32 {
        self.charge
    }

    /// The raw record this compound was decoded from
    pub fn record(&self) -> &Value {
        &self.record
    }

    pub fn properties(&self) -> &BTreeMap<PropertyTag, PropertyValue> {
        &self.properties
    }

    /// Record values without a known tag, keyed `label (name)`
    pub fn descriptors(&self) -> &BTreeMap<String, PropertyValue> {
        &self.descriptors
    }

    pub fn property(&self, tag: PropertyTag) -> Option<&PropertyValue> {
        self.properties.get(&tag)
    }

    /// Look up by tag name first, then among the opaque descriptors
    pub fn property_by_name(&self, name: &str) -> Option<&PropertyValue> {
        match PropertyTag::from_name(name) {
            Some(tag) => self.property(tag),
            None => self.descriptors.get(name),
        }
    }

    pub fn descriptor(&self, key: &str) -> Option<&PropertyValue> {
        self.descriptors.get(key)
    }

    fn text(&self, tag: PropertyTag) -> Option<&str> {
        self.property(tag).and_then(PropertyValue::as_str)
    }

    fn float(&self, tag: PropertyTag) -> Option<f64> {
        self.property(tag).and_then(PropertyValue::as_f64)
    }

    fn integer(&self, tag: PropertyTag) -> Option<i64> {
        self.property(tag).and_then(PropertyValue::as_i64)
    }

    pub fn molecular_formula(&self) -> Option<&str> {
        self.text(PropertyTag::MolecularFormula)
    }

    pub fn molecular_weight(&self) -> Option<f64> {
        self.float(PropertyTag::MolecularWeight)
    }

    /// Absolute SMILES, with stereo and isotopes
    pub fn smiles(&self) -> Option<&str> {
        self.text(PropertyTag::Smiles)
    }

    /// SMILES without stereo or isotopes
    pub fn connectivity_smiles(&self) -> Option<&str> {
        self.text(PropertyTag::ConnectivitySmiles)
    }

    pub fn inchi(&self) -> Option<&str> {
        self.text(PropertyTag::Inchi)
    }

    pub fn inchikey(&self) -> Option<&str> {
        self.text(PropertyTag::InchiKey)
    }

    pub fn iupac_name(&self) -> Option<&str> {
        self.text(PropertyTag::IupacName)
    }

    pub fn xlogp(&self) -> Option<f64> {
        self.float(PropertyTag::XLogP)
    }

    pub fn exact_mass(&self) -> Option<f64> {
        self.float(PropertyTag::ExactMass)
    }

    pub fn monoisotopic_mass(&self) -> Option<f64> {
        self.float(PropertyTag::MonoisotopicMass)
    }

    pub fn tpsa(&self) -> Option<f64> {
        self.float(PropertyTag::Tpsa)
    }

    pub fn complexity(&self) -> Option<f64> {
        self.float(PropertyTag::Complexity)
    }

    pub fn h_bond_donor_count(&self) -> Option<i64> {
        self.integer(PropertyTag::HBondDonorCount)
    }

    pub fn h_bond_acceptor_count(&self) -> Option<i64> {
        self.integer(PropertyTag::HBondAcceptorCount)
    }

    pub fn rotatable_bond_count(&self) -> Option<i64> {
        self.integer(PropertyTag::RotatableBondCount)
    }

    pub fn heavy_atom_count(&self) -> Option<i64> {
        self.integer(PropertyTag::HeavyAtomCount)
    }

    pub fn covalent_unit_count(&self) -> Option<i64> {
        self.integer(PropertyTag::CovalentUnitCount)
    }

    /// Raw padded hex fingerprint as served
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// The 881-bit CACTVS substructure-key fingerprint
    pub fn cactvs_fingerprint(&self) -> Result<Option<Fingerprint>, FingerprintError> {
        self.fingerprint.as_deref().map(Fingerprint::from_hex).transpose()
    }

    pub fn volume_3d(&self) -> Option<f64> {
        self.float(PropertyTag::Volume3D)
    }

    pub fn conformer_rmsd_3d(&self) -> Option<f64> {
        self.float(PropertyTag::ConformerModelRmsd3D)
    }

    pub fn effective_rotor_count_3d(&self) -> Option<f64> {
        self.float(PropertyTag::EffectiveRotorCount3D)
    }

    pub fn conformer_id_3d(&self) -> Option<&str> {
        self.descriptor("Conformer (ID)").and_then(PropertyValue::as_str)
    }

    pub fn mmff94_energy_3d(&self) -> Option<f64> {
        self.descriptor("Energy (MMFF94 NoEstat)")
            .and_then(PropertyValue::as_f64)
    }

    pub fn shape_selfoverlap_3d(&self) -> Option<f64> {
        self.descriptor("Shape (Self Overlap)")
            .and_then(PropertyValue::as_f64)
    }

    pub fn feature_selfoverlap_3d(&self) -> Option<f64> {
        self.descriptor("Feature (Self Overlap)")
            .and_then(PropertyValue::as_f64)
    }

    pub fn multipoles_3d(&self) -> Option<&PropertyValue> {
        self.descriptor("Shape (Multipoles)")
    }

    pub fn shape_fingerprint_3d(&self) -> Option<&PropertyValue> {
        self.descriptor("Fingerprint (Shape)")
    }

    pub fn pharmacophore_features_3d(&self) -> Option<&PropertyValue> {
        self.descriptor("Features (Pharmacophore)")
    }

    pub fn mmff94_partial_charges_3d(&self) -> Option<&PropertyValue> {
        self.descriptor("Charge (MMFF94 Partial)")
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cid {
            Some(cid) => write!(f, "Compound({})", cid),
            None => f.write_str("Compound()"),
        }
    }
}

fn build_atoms(raw: Option<&RawAtoms>) -> Result<Vec<Atom>, RecordError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    if raw.aid.len() != raw.element.len() {
        return Err(RecordError::Malformed("atom ids and elements differ in length".into()));
    }

    let charges: HashMap<u32, i32> = raw.charge.iter().map(|c| (c.aid, c.value)).collect();
    Ok(raw
        .aid
        .iter()
        .zip(&raw.element)
        .map(|(aid, number)| Atom {
            aid: *aid,
            number: *number,
            x: None,
            y: None,
            z: None,
            charge: charges.get(aid).copied().unwrap_or(0),
        })
        .collect())
}

fn build_bonds(raw: Option<&RawBonds>) -> Result<Vec<Bond>, RecordError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    if raw.aid1.len() != raw.aid2.len() || raw.aid1.len() != raw.order.len() {
        return Err(RecordError::Malformed("bond arrays differ in length".into()));
    }

    Ok(raw
        .aid1
        .iter()
        .zip(&raw.aid2)
        .zip(&raw.order)
        .map(|((aid1, aid2), order)| Bond {
            aid1: *aid1,
            aid2: *aid2,
            order: BondType::from_code(*order),
            style: None,
        })
        .collect())
}

/// Attach the first conformer's coordinates and bond styles; returns the detected dimensionality
fn apply_coordinates(
    coords: &[RawCoords],
    atoms: &mut [Atom],
    bonds: &mut [Bond],
) -> Result<Option<CoordinateType>, RecordError> {
    let Some(set) = coords.first() else {
        return Ok(None);
    };
    let Some(conformer) = set.conformers.first() else {
        return Ok(None);
    };

    let zs = conformer.z.as_deref().filter(|z| !z.is_empty());
    if set.aid.len() != conformer.x.len()
        || set.aid.len() != conformer.y.len()
        || set.aid.len() != atoms.len()
        || zs.is_some_and(|z| z.len() != set.aid.len())
    {
        return Err(RecordError::Malformed("atom coordinates differ in length".into()));
    }

    let index: HashMap<u32, usize> = atoms.iter().enumerate().map(|(i, a)| (a.aid, i)).collect();
    for (i, aid) in set.aid.iter().enumerate() {
        let Some(&slot) = index.get(aid) else {
            return Err(RecordError::Malformed(format!(
                "coordinates reference unknown atom {}",
                aid
            )));
        };
        atoms[slot].x = Some(conformer.x[i]);
        atoms[slot].y = Some(conformer.y[i]);
        atoms[slot].z = zs.map(|z| z[i]);
    }

    if let Some(style) = &conformer.style {
        let styles: HashMap<(u32, u32), i64> = style
            .aid1
            .iter()
            .zip(&style.aid2)
            .zip(&style.annotation)
            .flat_map(|((a, b), s)| [((*a, *b), *s), ((*b, *a), *s)])
            .collect();
        for bond in bonds.iter_mut() {
            bond.style = styles.get(&(bond.aid1, bond.aid2)).copied();
        }
    }

    let detected = if zs.is_some() {
        CoordinateType::ThreeD
    } else {
        CoordinateType::TwoD
    };
    // type code 2 declares 3-D, 1 declares 2-D
    let declared_3d = set.coord_type.contains(&2);
    if declared_3d != (detected == CoordinateType::ThreeD) {
        tracing::debug!(
            "Coordinate type codes {:?} disagree with conformer data; using {}",
            set.coord_type,
            detected
        );
    }
    Ok(Some(detected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn water() -> Value {
        json!({
            "id": {"id": {"cid": 962}},
            "atoms": {"aid": [1, 2, 3], "element": [8, 1, 1]},
            "bonds": {"aid1": [1, 1], "aid2": [2, 3], "order": [1, 1]},
            "coords": [{
                "type": [1, 5, 255],
                "aid": [1, 2, 3],
                "conformers": [{"x": [2.5369, 3.0739, 2.0], "y": [-0.155, 0.155, 0.155]}]
            }],
            "charge": 0,
            "props": [
                {"urn": {"label": "Molecular Formula", "datatype": 1}, "value": {"sval": "H2O"}},
                {"urn": {"label": "Molecular Weight", "datatype": 1}, "value": {"sval": "18.015"}},
                {"urn": {"label": "IUPAC Name", "name": "Systematic"}, "value": {"sval": "oxidane"}}
            ],
            "count": {"heavy_atom": 1, "covalent_unit": 1, "tautomers": -1}
        })
    }

    #[test]
    fn test_element_symbols() {
        assert_eq!(element_symbol(6), Some("C"));
        assert_eq!(element_symbol(118), Some("Og"));
        assert_eq!(element_symbol(252), Some("Lp"));
        assert_eq!(element_symbol(0), None);
    }

    #[test]
    fn test_decode_minimal_compound() {
        let compound = Compound::from_record(&water()).unwrap();
        assert_eq!(compound.cid(), Some(962));
        assert_eq!(compound.coordinate_type(), Some(CoordinateType::TwoD));
        assert_eq!(compound.elements(), vec!["O", "H", "H"]);
        assert_eq!(compound.molecular_formula(), Some("H2O"));
        assert_eq!(compound.molecular_weight(), Some(18.015));
        assert_eq!(compound.heavy_atom_count(), Some(1));
        assert_eq!(compound.iupac_name(), None);
        assert_eq!(
            compound.descriptor("IUPAC Name (Systematic)"),
            Some(&PropertyValue::Text("oxidane".into()))
        );
        assert_eq!(
            compound.descriptor("Count (tautomers)"),
            Some(&PropertyValue::Integer(-1))
        );
        assert!(compound.atoms().iter().all(|a| a.z.is_none()));
    }

    #[test]
    fn test_z_coordinates_override_declared_type() {
        let mut record = water();
        record["coords"][0]["conformers"][0]["z"] = json!([0.0, 0.1, -0.1]);
        let compound = Compound::from_record(&record).unwrap();
        assert_eq!(compound.coordinate_type(), Some(CoordinateType::ThreeD));
        assert_eq!(compound.atoms()[1].coordinate_type(), CoordinateType::ThreeD);
    }

    #[test]
    fn test_mismatched_atoms_is_parse_error() {
        let mut record = water();
        record["atoms"]["element"] = json!([8, 1]);
        assert!(matches!(
            Compound::from_record(&record),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_record_without_cid() {
        let mut record = water();
        record["id"] = json!({});
        let compound = Compound::from_record(&record).unwrap();
        assert_eq!(compound.cid(), None);
        assert_eq!(compound.to_string(), "Compound()");
    }

    #[test]
    fn test_atom_charges_and_bond_styles() {
        let record = json!({
            "atoms": {"aid": [1, 2], "element": [7, 8], "charge": [{"aid": 1, "value": 1}]},
            "bonds": {"aid1": [1], "aid2": [2], "order": [2]},
            "coords": [{
                "type": [1],
                "aid": [1, 2],
                "conformers": [{
                    "x": [0.0, 1.0], "y": [0.0, 0.0],
                    "style": {"annotation": [8], "aid1": [2], "aid2": [1]}
                }]
            }]
        });
        let compound = Compound::from_record(&record).unwrap();
        assert_eq!(compound.atoms()[0].charge, 1);
        assert_eq!(compound.bonds()[0].order, BondType::Double);
        assert_eq!(compound.bonds()[0].style, Some(8));
    }
}
