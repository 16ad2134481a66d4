use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A command isolated from the user's config and data directories
fn vetted(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vetted").unwrap();
    cmd.env("VETTED_CONFIG", dir.path().join("config.toml"))
        .env("VETTED_DATA_DIR", dir.path().join("data"))
        .env_remove("VETTED_BACKEND")
        .env_remove("VETTED_DATABASE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn validate_accepts_valid_file() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .args(["validate", "--format", "csv"])
        .arg(fixture("users.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("sayakpaul,qwe,20,95,sayak@mail,"))
        .stdout(predicate::str::contains("ranasen,asdf,22,89,,0123456789"));
}

#[test]
fn validate_stops_at_first_rejection() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .arg("validate")
        .arg(fixture("mixed_users.json"))
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("record 1: age: age must be positive"))
        .stderr(predicate::str::contains("record 2").not());
}

#[test]
fn validate_isolate_reports_every_rejection() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .args(["validate", "--isolate"])
        .arg(fixture("mixed_users.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("sayakpaul"))
        .stderr(predicate::str::contains("age must be positive"))
        .stderr(predicate::str::contains("need either email or phone"))
        .stderr(predicate::str::contains("2 of 3 records rejected"));
}

#[test]
fn validate_isolate_reports_each_rejection_once() {
    let dir = TempDir::new().unwrap();
    let output = vetted(&dir)
        .args(["validate", "--isolate"])
        .arg(fixture("mixed_users.json"))
        .output()
        .unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr.matches("age must be positive").count(), 1, "{stderr}");
    assert_eq!(
        stderr.matches("need either email or phone").count(),
        1,
        "{stderr}"
    );
}

#[test]
fn validate_isolate_from_config() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .args(["config", "set", "batch_mode", "isolate"])
        .assert()
        .success();

    vetted(&dir)
        .arg("validate")
        .arg(fixture("mixed_users.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 of 3 records rejected"));
}

#[test]
fn validate_demo_rejects_every_record() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .args(["validate", "--demo"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "username should be longer than 5 letters",
        ))
        .stdout(predicate::str::contains("age must be positive"))
        .stdout(predicate::str::contains("need either email or phone"))
        .stderr(predicate::str::contains("3 of 3 records rejected"));
}

#[test]
fn validate_rejects_non_array_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("single.json");
    std::fs::write(&path, r#"{"username": "sayakpaul"}"#).unwrap();

    vetted(&dir).arg("validate").arg(&path).assert().failure();
}

#[test]
fn demo_runs_once_then_hits_uniqueness() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("(12312) Mike Smith (M,35)"))
        .stdout(predicate::str::contains("1 Car owned by 12312"))
        .stdout(predicate::str::contains("  Car Mike"))
        .stdout(predicate::str::contains("  Mug Mike"))
        .stdout(predicate::str::contains("Bike Biju").not());

    vetted(&dir)
        .arg("demo")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Uniqueness violation"));
}

#[test]
fn demo_on_redb_backend() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .args(["--backend", "redb", "demo", "--owner", "Biju"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  Bike Biju"));

    assert!(dir.path().join("data").join("mydb.redb").exists());
}

#[test]
fn store_filter_and_owned_by() {
    let dir = TempDir::new().unwrap();
    vetted(&dir).args(["store", "seed"]).assert().success();

    let output = vetted(&dir)
        .args(["store", "filter", "people", "age>22", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let people: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = people
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["firstname"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Mike", "Biju"]);

    vetted(&dir)
        .args(["store", "owned-by", "Mike", "--format", "csv"])
        .assert()
        .success()
        .stdout("description,firstname\nCar,Mike\nMug,Mike\n");
}

#[test]
fn store_rejects_dangling_owner() {
    let dir = TempDir::new().unwrap();
    vetted(&dir).args(["store", "init"]).assert().success();

    vetted(&dir)
        .args(["store", "add-thing", "7", "Lamp", "99999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Referential violation"));

    vetted(&dir)
        .args(["store", "add-person", "99999", "Ada", "King", "F", "36"])
        .assert()
        .success();
    vetted(&dir)
        .args(["store", "add-thing", "7", "Lamp", "99999"])
        .assert()
        .success();

    vetted(&dir)
        .args(["store", "list", "things", "--format", "csv"])
        .assert()
        .success()
        .stdout("tid,description,owner\n7,Lamp,99999\n");
}

#[test]
fn store_filter_rejects_bad_expression() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .args(["store", "filter", "people", "height>180"])
        .assert()
        .failure();
    vetted(&dir)
        .args(["store", "filter", "people", "age"])
        .assert()
        .failure();
}

#[test]
fn config_round_trip() {
    let dir = TempDir::new().unwrap();
    vetted(&dir).args(["config", "init"]).assert().success();
    vetted(&dir).args(["config", "init"]).assert().failure();

    vetted(&dir)
        .args(["config", "set", "backend", "redb"])
        .assert()
        .success();
    vetted(&dir)
        .args(["config", "get", "backend"])
        .assert()
        .success()
        .stdout("redb\n");

    vetted(&dir)
        .args(["config", "get", "colour"])
        .assert()
        .failure();
}

#[test]
fn completions_generate() {
    let dir = TempDir::new().unwrap();
    vetted(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vetted"));
}
