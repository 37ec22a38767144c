use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_commands() {
    Command::cargo_bin("ndn-rs")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ping"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn unknown_command_is_a_usage_error() {
    Command::cargo_bin("ndn-rs")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn keygen_prints_key_material() {
    Command::cargo_bin("ndn-rs")
        .unwrap()
        .args(["keygen", "/keys/test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seed:"))
        .stdout(predicate::str::contains("public:"));
}

#[test]
fn ping_with_unreachable_forwarder_reports_face_down() {
    Command::cargo_bin("ndn-rs")
        .unwrap()
        .args([
            "--transport",
            "unix:///nonexistent/nfd.sock",
            "ping",
            "/test",
            "--count",
            "1",
        ])
        .assert()
        .failure()
        .code(106);
}
