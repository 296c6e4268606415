//! Integration tests for the PubChem client
//!
//! These tests run the reqwest-backed transport against a local mock server and
//! decode recorded PUG REST payloads.

use mockito::{Matcher, Server};
use pubchem_client::client::{ErrorKind, PubChemClient, PubChemError, QueryOutput};
use pubchem_client::config::Config;
use pubchem_client::models::{
    tanimoto, CoordinateType, DownloadRequest, Identifier, Operation, OutputFormat, PropertyTag,
    Query, SearchSpec,
};
use pubchem_client::Domain;

const COMPOUND_2D: &str = include_str!("fixtures/compound_2244_2d.json");
const COMPOUND_3D: &str = include_str!("fixtures/compound_2244_3d.json");
const SUBSTANCE: &str = include_str!("fixtures/substance_223766453.json");
const ASSAY: &str = include_str!("fixtures/assay_1000.json");

/// Client pointed at `base_url` with short delays
fn test_client(base_url: &str) -> PubChemClient {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.rate_limits.min_request_interval_ms = 0;
    config.retry.initial_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config.polling.initial_delay_ms = 10;
    config.polling.max_delay_ms = 50;
    PubChemClient::from_config(&config).expect("client")
}

fn fault_body(code: &str, message: &str) -> String {
    serde_json::json!({"Fault": {"Code": code, "Message": message}}).to_string()
}

#[tokio::test]
async fn test_compound_2d_record() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/compound/cid/2244/JSON")
        .match_header("user-agent", Matcher::Regex("pubchem-client/".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(COMPOUND_2D)
        .create_async()
        .await;

    let client = test_client(&server.url());
    let aspirin = client.compound_from_cid(2244).await.unwrap();
    mock.assert_async().await;

    assert_eq!(aspirin.cid(), Some(2244));
    assert_eq!(aspirin.coordinate_type(), Some(CoordinateType::TwoD));
    assert_eq!(aspirin.atoms().len(), 21);
    assert_eq!(aspirin.bonds().len(), 21);
    assert_eq!(aspirin.molecular_formula(), Some("C9H8O4"));
    assert_eq!(aspirin.molecular_weight(), Some(180.16));
    assert_eq!(aspirin.smiles(), Some("CC(=O)OC1=CC=CC=C1C(=O)O"));
    assert_eq!(aspirin.inchikey(), Some("BSYNRYMUTXBXSQ-UHFFFAOYSA-N"));
    assert_eq!(aspirin.iupac_name(), Some("2-acetyloxybenzoic acid"));
    assert_eq!(aspirin.xlogp(), Some(1.2));
    assert_eq!(aspirin.h_bond_donor_count(), Some(1));
    assert_eq!(aspirin.heavy_atom_count(), Some(13));

    // 3-D descriptors are absent, not defaulted
    for tag in PropertyTag::ALL.iter().filter(|tag| tag.is_3d()) {
        assert!(aspirin.property(*tag).is_none(), "{} present", tag);
    }
    assert_eq!(aspirin.volume_3d(), None);
    assert_eq!(aspirin.conformer_id_3d(), None);
    assert_eq!(aspirin.mmff94_energy_3d(), None);
    assert!(aspirin.shape_fingerprint_3d().is_none());
}

#[test]
fn test_fingerprint_from_record() {
    let value: serde_json::Value = serde_json::from_str(COMPOUND_2D).unwrap();
    let record = &value["PC_Compounds"][0];
    let first = pubchem_client::Compound::from_record(record).unwrap();
    let second = pubchem_client::Compound::from_record(record).unwrap();
    assert_eq!(first, second);

    let fp = first.cactvs_fingerprint().unwrap().unwrap();
    assert_eq!(fp.bit_len(), 881);
    assert!(fp.count_ones() > 0);
    assert_eq!(tanimoto(&fp, &fp), 1.0);
}

#[tokio::test]
async fn test_compound_3d_record() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/compound/cid/2244/JSON")
        .match_query(Matcher::UrlEncoded("record_type".into(), "3d".into()))
        .with_status(200)
        .with_body(COMPOUND_3D)
        .create_async()
        .await;

    let client = test_client(&server.url());
    let aspirin = client.compound_3d_from_cid(2244).await.unwrap();
    mock.assert_async().await;

    assert_eq!(aspirin.coordinate_type(), Some(CoordinateType::ThreeD));
    assert!(aspirin.atoms().iter().all(|atom| atom.z.is_some()));
    assert_eq!(aspirin.conformer_id_3d(), Some("000008C400000001"));
    assert_eq!(aspirin.mmff94_energy_3d(), Some(39.5952));
    assert_eq!(aspirin.volume_3d(), Some(136.0));
    assert_eq!(aspirin.conformer_rmsd_3d(), Some(0.4));
    assert_eq!(aspirin.effective_rotor_count_3d(), Some(3.6));
    assert!(aspirin.multipoles_3d().is_some());
    assert!(aspirin.pharmacophore_features_3d().is_some());
    assert!(aspirin.fingerprint().is_none());
}

#[tokio::test]
async fn test_not_found_depends_on_operation() {
    let mut server = Server::new_async().await;
    let _missing_cid = server
        .mock("GET", "/compound/cid/999999999/JSON")
        .with_status(404)
        .with_body(fault_body("PUGREST.NotFound", "No record data for CID 999999999"))
        .create_async()
        .await;
    let _missing_name = server
        .mock("GET", "/compound/name/notachemical/cids/JSON")
        .with_status(404)
        .with_body(fault_body("PUGREST.NotFound", "No CID found"))
        .create_async()
        .await;

    let client = test_client(&server.url());

    let err = client.compound_from_cid(999_999_999).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("PUGREST.NotFound"));

    let cids = client
        .get_cids(Query::compound(Identifier::name("notachemical")))
        .await
        .unwrap();
    assert!(cids.is_empty());
}

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/compound/name/aspirin/property/NotAProperty/JSON")
        .with_status(400)
        .with_body(fault_body("PUGREST.BadRequest", "Invalid property"))
        .expect(1)
        .create_async()
        .await;

    let client = test_client(&server.url());
    let err = client
        .get_properties(["NotAProperty"], Query::compound(Identifier::name("aspirin")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::BadRequest));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_properties_by_smiles_are_posted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/compound/smiles/property/MolecularWeight,XLogP,InChIKey/JSON")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::UrlEncoded(
            "smiles".into(),
            "CC(=O)OC1=CC=CC=C1C(=O)O".into(),
        ))
        .with_status(200)
        .with_body(
            r#"{"PropertyTable": {"Properties": [
                {"CID": 2244, "MolecularWeight": "180.16", "XLogP": 1.2,
                 "InChIKey": "BSYNRYMUTXBXSQ-UHFFFAOYSA-N", "Fsp3": 0.11}
            ]}}"#,
        )
        .create_async()
        .await;

    let client = test_client(&server.url());
    let rows = client
        .get_properties(
            ["molecular weight", "xlogp", "InChIKey"],
            Query::compound(Identifier::smiles("CC(=O)OC1=CC=CC=C1C(=O)O")),
        )
        .await
        .unwrap();
    mock.assert_async().await;

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.cid, Some(2244));
    assert_eq!(
        row.get(PropertyTag::MolecularWeight).and_then(|v| v.as_f64()),
        Some(180.16)
    );
    assert_eq!(row.get(PropertyTag::Tpsa), None);
    // unknown columns survive as opaque values
    assert!(row.extra.contains_key("Fsp3"));
    assert_eq!(
        row.get_by_name("Fsp3").and_then(|v| v.as_f64()),
        Some(0.11)
    );
}

#[tokio::test]
async fn test_formula_search_polls_list_key() {
    let mut server = Server::new_async().await;
    let submit = server
        .mock("GET", "/compound/formula/C9H8O4/cids/JSON")
        .with_status(202)
        .with_body(r#"{"Waiting": {"ListKey": "3141592653", "Message": "Your request is running"}}"#)
        .create_async()
        .await;
    let page = server
        .mock("GET", "/compound/listkey/3141592653/cids/JSON")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("listkey_start".into(), "2".into()),
            Matcher::UrlEncoded("listkey_count".into(), "3".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"IdentifierList": {"CID": [2244, 5161, 10745], "Size": 148}}"#)
        .create_async()
        .await;

    let client = test_client(&server.url());
    let query = Query::compound(Identifier::formula("C9H8O4"))
        .operation(Operation::Cids)
        .count(3)
        .start(2);
    let outcome = client.run_job(&query).await.unwrap();
    submit.assert_async().await;
    page.assert_async().await;

    let report = outcome.report().clone();
    assert_eq!(report.list_key.as_deref(), Some("3141592653"));
    assert_eq!(report.polls, 1);
    assert_eq!(outcome.results().total(), Some(148));
    assert_eq!(outcome.into_result().unwrap().len(), 3);
}

#[tokio::test]
async fn test_structure_search_rejects_names_locally() {
    let server = Server::new_async().await;
    let client = test_client(&server.url());

    let err = client
        .get_cids(Query::compound(Identifier::name("aspirin")).search(SearchSpec::substructure()))
        .await
        .unwrap_err();
    assert!(matches!(err, PubChemError::Precondition(_)));
}

#[tokio::test]
async fn test_substance_and_assay_records() {
    let mut server = Server::new_async().await;
    let _substance = server
        .mock("GET", "/substance/sid/223766453/JSON")
        .with_status(200)
        .with_body(SUBSTANCE)
        .create_async()
        .await;
    let _assay = server
        .mock("GET", "/assay/aid/1000/description/JSON")
        .with_status(200)
        .with_body(ASSAY)
        .create_async()
        .await;

    let client = test_client(&server.url());

    let substance = client.substance_from_sid(223766453).await.unwrap();
    assert_eq!(substance.source_name(), Some("MolPort"));
    assert_eq!(substance.standardized_cid(), Some(2244));
    assert_eq!(substance.synonyms()[0], "aspirin");
    assert_eq!(
        substance.deposited_compound().map(|c| c.atoms().len()),
        Some(13)
    );

    let assay = client.assay_from_aid(1000).await.unwrap();
    assert_eq!(assay.aid(), 1000);
    assert_eq!(assay.results().len(), 3);
    assert_eq!(assay.results()[1].unit, Some(5));
    assert_eq!(assay.targets().map(|t| t.len()), Some(1));
}

#[tokio::test]
async fn test_all_sources() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/sources/substance/JSON")
        .with_status(200)
        .with_body(r#"{"InformationList": {"SourceName": ["001Chemical", "A2B Chem", "MolPort"]}}"#)
        .create_async()
        .await;

    let client = test_client(&server.url());
    let sources = client.get_all_sources(Domain::Substance).await.unwrap();
    assert_eq!(sources, vec!["001Chemical", "A2B Chem", "MolPort"]);
}

#[tokio::test]
async fn test_download_sdf() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/compound/cid/2244/SDF")
        .with_status(200)
        .with_body("2244\n  -OEChem-\n\n 21 21  0     0  0  0  0  0  0999 V2000\nM  END\n$$$$\n")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aspirin.sdf");
    let client = test_client(&server.url());

    let result = client
        .download(
            Query::compound(Identifier::cid(2244)),
            DownloadRequest::new(OutputFormat::Sdf, &path),
        )
        .await
        .unwrap();
    assert_eq!(result.path, path);
    assert!(std::fs::read_to_string(&path).unwrap().contains("M  END"));

    // a second download without overwrite leaves the file alone
    let err = client
        .download(
            Query::compound(Identifier::cid(2244)),
            DownloadRequest::new(OutputFormat::Sdf, &path),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PubChemError::Io(_)));
}

#[tokio::test]
async fn test_png_payload_is_checked() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/compound/cid/2244/PNG")
        .with_status(200)
        .with_body("<html>not an image</html>")
        .create_async()
        .await;

    let client = test_client(&server.url());
    let query = Query::compound(Identifier::cid(2244)).output(OutputFormat::Png);
    let err = client.get(&query).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ResponseParseError));
}

#[tokio::test]
async fn test_csv_passthrough() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/compound/cid/2244,3672/property/MolecularWeight/CSV")
        .with_status(200)
        .with_body("\"CID\",\"MolecularWeight\"\n2244,\"180.16\"\n3672,\"206.28\"\n")
        .create_async()
        .await;

    let client = test_client(&server.url());
    let query = Query::compound(Identifier::cids([2244, 3672]))
        .operation(Operation::property(["MolecularWeight"]))
        .output(OutputFormat::Csv);
    match client.get(&query).await.unwrap() {
        QueryOutput::Opaque { bytes, .. } => {
            let text = String::from_utf8(bytes).unwrap();
            assert_eq!(text.lines().count(), 3);
        }
        other => panic!("expected CSV passthrough, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_failure_surfaces_transport_error() {
    let mut config = Config::default();
    config.api.base_url = "http://127.0.0.1:9".to_string();
    config.rate_limits.min_request_interval_ms = 0;
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.retry.server_error_attempts = 2;
    let client = PubChemClient::from_config(&config).unwrap();

    let err = client.compound_from_cid(2244).await.unwrap_err();
    assert!(matches!(err, PubChemError::Transport(_)));
    assert_eq!(err.kind(), Some(ErrorKind::ServerError));
}
