//! Startup behaviour of the `groq-relay` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn relay_command(port: u16) -> Command {
    let mut cmd = Command::cargo_bin("groq-relay").unwrap();
    cmd.env_remove("GROQ_API_KEY")
        .env("PORT", port.to_string())
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .timeout(Duration::from_secs(30));
    cmd
}

#[test]
fn test_missing_api_key_refuses_to_start() {
    let port = free_port();

    relay_command(port)
        .assert()
        .failure()
        .stdout(
            predicate::str::contains("GROQ_API_KEY is not set")
                .and(predicate::str::contains("listening").not()),
        );

    // Nothing was left holding the port.
    assert!(std::net::TcpListener::bind(("0.0.0.0", port)).is_ok());
}

#[test]
fn test_blank_api_key_refuses_to_start() {
    let port = free_port();

    relay_command(port)
        .env("GROQ_API_KEY", "   ")
        .assert()
        .failure()
        .stdout(predicate::str::contains("listening").not());
}
