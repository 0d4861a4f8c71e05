use assert_cmd::Command;
use predicates::str::contains;
use std::fs;

fn rag(store: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("cli").unwrap();
    cmd.args(["--model", "dummy", "--store"]).arg(store);
    cmd
}

#[test]
fn config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rag.config.toml");

    let mut cmd = Command::cargo_bin("cli").unwrap();
    cmd.args(["config", "init", "--path"]).arg(&path).assert().success().stdout(contains("Wrote"));
    assert!(fs::read_to_string(&path).unwrap().contains("[routing]"));

    // refuses to clobber without --force
    let mut cmd = Command::cargo_bin("cli").unwrap();
    cmd.args(["config", "init", "--path"]).arg(&path).assert().failure();

    let mut cmd = Command::cargo_bin("cli").unwrap();
    cmd.arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("merge_strategy = \"best\""));
}

#[test]
fn ingest_then_search() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("dataset");
    let store = dir.path().join("lancedb");
    fs::create_dir_all(dataset.join("annual_reports")).unwrap();
    fs::write(dataset.join("annual_reports/report_2021.txt"), "Net profit 2021").unwrap();
    fs::write(dataset.join("annual_reports/report_2022.txt"), "Net profit 2022").unwrap();

    rag(&store)
        .args(["ingest", "annual_reports", "--dataset"])
        .arg(&dataset)
        .assert()
        .success()
        .stdout(contains("annual_reports: 2 ingested, 0 failed"))
        .stderr(contains("done:"));

    rag(&store).arg("collections").assert().success().stdout(contains("annual_reports"));

    rag(&store)
        .args(["info", "annual_reports"])
        .assert()
        .success()
        .stdout(contains("annual_reports: 2 documents"));

    rag(&store)
        .args(["search", "annual_reports", "profit", "-k", "1"])
        .assert()
        .success()
        .stdout(contains("--- Document 1: report_"));

    rag(&store)
        .args(["search", "annual_reports", "profit", "--shape", "dict", "--filter", "filename = 'report_2022.txt'"])
        .assert()
        .success()
        .stdout(contains("\"filename\": \"report_2022.txt\""));

    rag(&store)
        .args(["search-many", "profit", "-c", "annual_reports", "-c", "missing"])
        .assert()
        .success()
        .stderr(contains("warning:"));

    rag(&store)
        .args(["search", "missing", "profit"])
        .assert()
        .failure()
        .stderr(contains("collection not found"));
}
