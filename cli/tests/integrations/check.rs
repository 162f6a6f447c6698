use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("canvass"))
        .stdout(predicate::str::contains("walk"));
}

#[test]
fn test_cli_check_directory() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("household.survey"),
        r#"
[COUNT!] How many people live here?
{number min=1 max=10}
<loop bound=COUNT max=3>
[NAME] Name of person $i
{text}
</loop>
[END] Thank you
"#,
    )
    .unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "not a survey").unwrap();

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("check").arg(temp_dir.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("NAME_3_3"))
        .stdout(predicate::str::contains("Loop 0: NAME x up to 3 (bound by COUNT)"))
        .stdout(predicate::str::contains("1 definition(s) OK"));
}

#[test]
fn test_cli_check_reports_parse_errors() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("broken.survey");
    fs::write(&file, "[N] How many?\n<loop bound=N>\n[A] a\n</loop>\n").unwrap();

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("check").arg(&file);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("max=N"))
        .stderr(predicate::str::contains("1 of 1 definition(s) failed to compile"));
}

#[test]
fn test_cli_check_quiet() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("ok.survey");
    fs::write(&file, "[Q1] a\n[END] b\n").unwrap();

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("check").arg("--quiet").arg(&file);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Survey").not())
        .stdout(predicate::str::contains("1 definition(s) OK"));
}

#[test]
fn test_cli_check_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("check").arg(temp_dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No .survey files found"));
}
