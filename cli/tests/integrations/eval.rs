use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_eval_nested_legacy_call() {
    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("eval")
        .arg("and(equals(A,1),or(equals(B,2),equals(B,3)))")
        .arg("A=1")
        .arg("B=3");
    cmd.assert().success().stdout("true\n");
}

#[test]
fn test_cli_eval_arithmetic() {
    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("eval").arg("ADULTS + KIDS * 2").arg("ADULTS=2").arg("KIDS=3");
    cmd.assert().success().stdout("8\n");
}

#[test]
fn test_cli_eval_checkbox_list() {
    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("eval").arg("count(PETS)").arg("PETS=1,3,4");
    cmd.assert().success().stdout("3\n");
}

#[test]
fn test_cli_eval_rejects_bad_answer() {
    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("eval").arg("Q1").arg("Q1");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("should look like TOKEN=value"));
}

#[test]
fn test_cli_eval_expression_error() {
    let mut cmd = Command::cargo_bin("canvass").unwrap();
    cmd.arg("eval").arg("1 / 0");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Expression error"));
}
