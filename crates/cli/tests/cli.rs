//! CLI smoke tests against the seeded demo session.

use assert_cmd::Command;
use predicates::prelude::*;

fn cadenza() -> Command {
    Command::cargo_bin("cadenza").expect("binary builds")
}

#[test]
fn generate_debits_and_prints_the_track() {
    cadenza()
        .args([
            "generate",
            "--prompt",
            "a calm piano melody",
            "--instant",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed: Generation 1"))
        .stdout(predicate::str::contains("Balance: 490 tokens"));
}

#[test]
fn simulated_failure_exits_nonzero_and_refunds() {
    cadenza()
        .args([
            "generate",
            "--prompt",
            "a calm piano melody",
            "--instant",
            "--simulate-failure",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("10 tokens refunded, balance 500"));
}

#[test]
fn empty_prompt_is_rejected() {
    cadenza()
        .args(["generate", "--prompt", "   ", "--instant"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("prompt must not be empty"));
}

#[test]
fn packages_lists_the_catalog_in_display_order() {
    let output = cadenza().args(["packages"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let starter = stdout.find("starter").expect("starter listed");
    let creator = stdout.find("creator").expect("creator listed");
    let studio = stdout.find("studio").expect("studio listed");
    assert!(starter < creator && creator < studio);
    assert!(stdout.contains("$19.99"));
}

#[test]
fn buy_credits_the_balance() {
    cadenza()
        .args(["buy", "creator"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Balance: 1000 tokens"));
}

#[test]
fn buy_unknown_package_fails() {
    cadenza()
        .args(["buy", "deluxe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("package not found: deluxe"));
}

#[test]
fn balance_json_round_trips() {
    let output = cadenza()
        .args(["balance", "--output", "json"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["token_balance"], 500);
    assert_eq!(value["user_id"], "studio");
}

#[test]
fn session_runs_prompts_and_reports() {
    cadenza()
        .args([
            "session",
            "an upbeat dance track",
            "a slow ambient pad",
            "--instant",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed: Generation 1"))
        .stdout(predicate::str::contains("Completed: Generation 2"))
        .stdout(predicate::str::contains("Balance: 480 tokens"));
}

#[test]
fn config_file_overrides_the_seeded_account() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("cadenza.toml");
    std::fs::write(
        &config_path,
        r#"
        [account]
        starting_tokens = 5
        "#,
    )
    .unwrap();

    cadenza()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "generate",
            "--prompt",
            "a calm piano melody",
            "--instant",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient balance"));
}
