use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_cli_render_single_question() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("pets.survey");
    fs::write(&file, "[Q1?] Hello {@user}, any pets?\n(+1) Dog\n(!9) None\n[END] Bye\n").unwrap();

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("render")
        .arg(&file)
        .arg("--question")
        .arg("Q1")
        .arg("--user")
        .arg("Ada");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello Ada, any pets?"))
        .stdout(predicate::str::contains("name=\"Q1_choices\""))
        .stdout(predicate::str::contains("END_submit").not());
}

#[test]
fn test_cli_render_all_questions() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("two.survey");
    fs::write(&file, "[Q1] First\n{text}\n[END] Bye\n").unwrap();

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("render").arg(&file);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("id=\"Q1\""))
        .stdout(predicate::str::contains("END_submit"));
}

#[test]
fn test_cli_render_unknown_question() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("one.survey");
    fs::write(&file, "[Q1] First\n").unwrap();

    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("render").arg(&file).arg("-q").arg("Q9");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Question 'Q9' not found"));
}
