use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_survey(dir: &TempDir, definition: &str) -> PathBuf {
    let file = dir.path().join("walk.survey");
    fs::write(&file, definition).unwrap();
    file
}

#[test]
fn test_cli_walk_skips_hidden_question() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_survey(
        &temp_dir,
        "[Q1] Car?\n(1) yes\n(0) no\n[Q2,displayif=equals(Q1,1)] Which one?\n{text}\n[Q3] Next\n{text}\n[END] Bye\n",
    );

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("walk").arg(&file).arg("Q1=0");

    cmd.assert()
        .success()
        .stdout("Q1\nQ3\nEND\n(end of survey)\n");
}

#[test]
fn test_cli_walk_through_loop() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_survey(
        &temp_dir,
        "[COUNT] How many?\n{number}\n<loop bound=COUNT max=5>\n[NAME] Person $i\n{text}\n</loop>\n[END] Bye\n",
    );

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("walk").arg(&file).arg("COUNT=2");

    cmd.assert()
        .success()
        .stdout("COUNT\nNAME_1_1\nNAME_2_2\nEND\n(end of survey)\n");
}

#[test]
fn test_cli_walk_stops_at_hard_mandate() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_survey(&temp_dir, "[Q1] a\n{text}\n[Q2!] b\n{text}\n[END] c\n");

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("walk").arg(&file);

    cmd.assert()
        .success()
        .stdout("Q1\nQ2\n")
        .stderr(predicate::str::contains("Stopped at Q2"));
}

#[test]
fn test_cli_walk_with_compound_answer_and_config() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_survey(
        &temp_dir,
        "[Q1] Travel?\n(1) Bus\n(2) Car -> Q3\n[Q2] Line {text}\n[Q3] Done?\n[END] Bye\n",
    );
    let config = temp_dir.path().join("session.json");
    fs::write(&config, r#"{"survey_name": "travel", "worker_timeout_ms": null}"#).unwrap();

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("walk")
        .arg(&file)
        .arg("choice.Q1=2")
        .arg("--config")
        .arg(&config);

    cmd.assert()
        .success()
        .stdout("Q1\nQ3\nEND\n(end of survey)\n");
}

#[test]
fn test_cli_walk_bad_loop_bound() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_survey(
        &temp_dir,
        "[COUNT] How many?\n{number}\n<loop bound=COUNT max=5>\n[NAME] Person $i\n{text}\n</loop>\n[END] Bye\n",
    );

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("walk").arg(&file).arg("COUNT=lots");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("'COUNT' must hold a whole number, found 'lots'"));
}
