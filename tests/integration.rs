use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn tpub_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tpub");
    path
}

fn write_config(root: &Path) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/techpub.sqlite"

[server]
bind = "127.0.0.1:7430"
"#,
        root.display()
    );

    let config_path = config_dir.join("techpub.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn dmc_file(tech_name: &str, issue: &str, body: &str) -> String {
    format!(
        r#"<dmodule>
  <identAndStatusSection>
    <dmAddress>
      <dmIdent>
        <issueInfo issueNumber="{issue}" inWork="00"/>
      </dmIdent>
      <dmAddressItems>
        <issueDate year="2018" month="08" day="11"/>
        <dmTitle><techName>{tech_name}</techName></dmTitle>
      </dmAddressItems>
    </dmAddress>
  </identAndStatusSection>
  <content>{body}</content>
</dmodule>"#
    )
}

fn dm_ref(tech_name: &str, issue: &str) -> String {
    format!(
        r#"<dmRef>
  <dmRefIdent><issueInfo issueNumber="{issue}"/></dmRefIdent>
  <dmRefAddressItems><dmTitle><techName>{tech_name}</techName></dmTitle></dmRefAddressItems>
</dmRef>"#
    )
}

fn pmc_file(title: &str, model: &str, content: &str) -> String {
    format!(
        r#"<pm>
  <identAndStatusSection>
    <pmAddress>
      <pmIdent><issueInfo issueNumber="002" inWork="00"/></pmIdent>
      <pmAddressItems><pmTitle>{title}</pmTitle></pmAddressItems>
    </pmAddress>
    <pmStatus>
      <brexDmRef><dmRef><dmRefIdent>
        <dmCode modelIdentCode="{model}" systemDiffCode="A" systemCode="00"
                subSystemCode="0" subSubSystemCode="0" assyCode="00"
                disassyCode="00" disassyCodeVariant="A" infoCode="022"
                infoCodeVariant="A" itemLocationCode="D"/>
      </dmRefIdent></dmRef></brexDmRef>
    </pmStatus>
  </identAndStatusSection>
  <content>{content}</content>
</pm>"#
    )
}

/// One publication directory: a chapter holding two leaves, a top-level
/// leaf, and a media directory backing the figure in the first leaf.
fn write_publication(root: &Path, name: &str, model: &str) -> PathBuf {
    let pub_dir = root.join(name);
    fs::create_dir_all(&pub_dir).unwrap();

    let content = format!(
        "<pmEntry><pmEntryTitle>Chapter 1</pmEntryTitle>{}{}</pmEntry>{}",
        dm_ref("Oil pump", "001"),
        dm_ref("Fuel filter", "001"),
        dm_ref("Overview", "002"),
    );
    fs::write(pub_dir.join("PMC-DEMO.xml"), pmc_file("Demo manual", model, content.as_str()))
        .unwrap();

    fs::write(
        pub_dir.join("DMC-OILPUMP.xml"),
        dmc_file(
            "Oil pump",
            "001",
            r#"<figure><graphic id="fig-1" infoEntityIdent="ICN-OIL-01">
                 <hotspot coords="1,2,3,4"/></graphic></figure>
               <partRef partNumberValue="PN-100"/>"#,
        ),
    )
    .unwrap();
    fs::write(
        pub_dir.join("DMC-FUELFILTER.xml"),
        dmc_file("Fuel filter", "001", "<description>Replace filter.</description>"),
    )
    .unwrap();
    fs::write(
        pub_dir.join("DMC-OVERVIEW.xml"),
        dmc_file("Overview", "002", "<description>System overview.</description>"),
    )
    .unwrap();

    let media = pub_dir.join("media");
    fs::create_dir_all(&media).unwrap();
    fs::write(media.join("ICN-OIL-01.png"), b"png").unwrap();

    pub_dir
}

fn run_tpub(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = tpub_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run tpub binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Extracts the JSON document from mixed stdout (header lines + JSON).
fn json_from_stdout(stdout: &str) -> serde_json::Value {
    let start = stdout.find('{').expect("no JSON in stdout");
    serde_json::from_str(&stdout[start..]).expect("invalid JSON in stdout")
}

const DEMO_CODE: &str = "DEMO-A-00-0-0-00-00-A-022-A-D";

#[test]
fn init_creates_database_and_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());

    let (stdout, stderr, success) = run_tpub(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_tpub(&config_path, &["init"]);
    assert!(success, "second init must succeed");
}

#[test]
fn ingest_reports_code_and_counts() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    let pub_dir = write_publication(tmp.path(), "pub", "DEMO");

    let (stdout, stderr, success) =
        run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&format!("code {}", DEMO_CODE)));
    assert!(stdout.contains("staged modules: 3"));
    assert!(stdout.contains("nodes created: 4 (1 categories, 3 leaves)"));
    assert!(stdout.contains("normalized: 3 (0 failed)"));
    assert!(stdout.contains("ok"));
}

#[test]
fn tree_snapshot_has_the_envelope_shape_and_order() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    let pub_dir = write_publication(tmp.path(), "pub", "DEMO");

    let (_, _, success) = run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(success);

    let (stdout, stderr, success) = run_tpub(&config_path, &["tree", DEMO_CODE]);
    assert!(success, "tree failed: stdout={}, stderr={}", stdout, stderr);

    let tree = json_from_stdout(&stdout);
    let data = &tree["core"]["data"];
    assert_eq!(data.as_array().unwrap().len(), 2);

    // Category precedes the top-level leaf.
    assert_eq!(data[0]["text"], "Chapter 1");
    assert_eq!(data[1]["text"], "Overview");
    assert_eq!(data[1]["children"].as_array().unwrap().len(), 0);

    // Leaves under the chapter keep document order.
    let chapter = &data[0]["children"];
    assert_eq!(chapter.as_array().unwrap().len(), 2);
    assert_eq!(chapter[0]["text"], "Oil pump");
    assert_eq!(chapter[1]["text"], "Fuel filter");

    // Every node links to itself.
    assert_eq!(data[0]["a_attr"]["href"], data[0]["id"]);
}

#[test]
fn get_returns_the_normalized_display_record() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    let pub_dir = write_publication(tmp.path(), "pub", "DEMO");

    let (_, _, success) = run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(success);

    let (stdout, _, _) = run_tpub(&config_path, &["tree", DEMO_CODE]);
    let tree = json_from_stdout(&stdout);
    let oil_pump_id = tree["core"]["data"][0]["children"][0]["id"].as_i64().unwrap();

    let (stdout, stderr, success) =
        run_tpub(&config_path, &["get", &oil_pump_id.to_string()]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("tech_name:    Oil pump"));
    assert!(stdout.contains("issue_number: 001"));

    let record = json_from_stdout(&stdout);
    assert_eq!(record["issue_date"], "2018-08-11");
    assert_eq!(record["images"][0]["path"], "media/ICN-OIL-01.png");
    assert_eq!(record["images"][0]["hotspots"][0]["coords"], "1,2,3,4");
    assert_eq!(record["parts"][0]["attributes"]["partNumberValue"], "PN-100");
}

#[test]
fn get_missing_node_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    run_tpub(&config_path, &["init"]);

    let (_, stderr, success) = run_tpub(&config_path, &["get", "9999"]);
    assert!(!success);
    assert!(stderr.contains("node not found"));
}

#[test]
fn unresolved_leaf_aborts_the_run_with_the_failing_branch() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    let pub_dir = write_publication(tmp.path(), "pub", "DEMO");
    fs::remove_file(pub_dir.join("DMC-FUELFILTER.xml")).unwrap();

    let (_, stderr, success) = run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unresolved leaf reference"));
    assert!(stderr.contains("entry #2 under 'Chapter 1'"));
    assert!(stderr.contains("Fuel filter"));

    // Nothing of the tree survives the failed run.
    let (_, stderr, success) = run_tpub(&config_path, &["tree", DEMO_CODE]);
    assert!(!success);
    assert!(stderr.contains("publication not found"));
}

#[test]
fn staging_does_not_leak_between_runs() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());

    // First run stages three modules, then fails on a missing leaf.
    let first = write_publication(tmp.path(), "first", "DEMO");
    fs::remove_file(first.join("DMC-OVERVIEW.xml")).unwrap();
    let (_, _, success) = run_tpub(&config_path, &["ingest", first.to_str().unwrap()]);
    assert!(!success);

    // Second publication references a module staged only by the first
    // run. If staging leaked, this would resolve; it must not.
    let second = tmp.path().join("second");
    fs::create_dir_all(&second).unwrap();
    fs::write(
        second.join("PMC-OTHER.xml"),
        pmc_file("Other manual", "OTHER", dm_ref("Oil pump", "001").as_str()),
    )
    .unwrap();

    let (_, stderr, success) = run_tpub(&config_path, &["ingest", second.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("unresolved leaf reference"));
}

#[test]
fn two_structure_files_are_ambiguous() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    let pub_dir = write_publication(tmp.path(), "pub", "DEMO");
    fs::write(
        pub_dir.join("PMC-EXTRA.xml"),
        pmc_file("Extra", "EXTRA", ""),
    )
    .unwrap();

    let (_, stderr, success) = run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("expected exactly one"));
}

#[test]
fn duplicate_content_identity_is_ambiguous_at_resolution() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    let pub_dir = write_publication(tmp.path(), "pub", "DEMO");
    fs::write(
        pub_dir.join("DMC-OVERVIEW-COPY.xml"),
        dmc_file("Overview", "002", "<description>Duplicate.</description>"),
    )
    .unwrap();

    let (_, stderr, success) = run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("ambiguous leaf reference"));
    assert!(stderr.contains("Overview"));
}

#[test]
fn a_content_file_without_identity_aborts_the_load() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    let pub_dir = write_publication(tmp.path(), "pub", "DEMO");
    fs::write(pub_dir.join("DMC-BAD.xml"), "<dmodule><content/></dmodule>").unwrap();

    let (_, stderr, success) = run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("could not extract identity from 'DMC-BAD.xml'"));
}

#[test]
fn reingesting_the_same_code_is_rejected_by_the_store() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(tmp.path());
    let pub_dir = write_publication(tmp.path(), "pub", "DEMO");

    let (_, _, success) = run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(success);

    let (_, stderr, success) = run_tpub(&config_path, &["ingest", pub_dir.to_str().unwrap()]);
    assert!(!success, "duplicate code must fail: {}", stderr);
}
