//! Integration tests for `mmchat sessions`.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn seed_history(home: &TempDir) {
    let history = json!({
        "chat_1": {
            "id": "chat_1",
            "title": "Hello there",
            "messages": [
                {"role": "user", "parts": [
                    {"type": "text", "content": "Hello there", "citations": []},
                    {"type": "image", "content": "data:image/png;base64,AQID", "citations": []}
                ]},
                {"role": "model", "parts": [
                    {"type": "text", "content": "General Kenobi", "citations": []},
                    {"type": "citation", "content": "", "citations": [
                        {"uri": "https://example.com/kenobi", "title": ""}
                    ]}
                ]}
            ]
        },
        "chat_2": {"id": "chat_2", "title": "New Chat", "messages": []}
    });
    fs::write(
        home.path().join("chatHistory.json"),
        serde_json::to_string(&history).unwrap(),
    )
    .unwrap();
}

fn stored_history(home: &TempDir) -> Value {
    let raw = fs::read_to_string(home.path().join("chatHistory.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_sessions_list_empty() {
    let home = TempDir::new().unwrap();

    cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions found."));

    assert!(!home.path().join("chatHistory.json").exists());
}

#[test]
fn test_sessions_list_in_creation_order() {
    let home = TempDir::new().unwrap();
    seed_history(&home);

    cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::diff(
            "  chat_1  Hello there  (2 messages)\n* chat_2  New Chat  (0 messages)\n",
        ));
}

#[test]
fn test_sessions_show_renders_transcript() {
    let home = TempDir::new().unwrap();
    seed_history(&home);

    cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "show", "chat_1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("== Hello there (chat_1) =="))
        .stdout(predicate::str::contains("You:\nHello there\n[image: image/png, 3 bytes]"))
        .stdout(predicate::str::contains("Multimodal:\nGeneral Kenobi"))
        .stdout(predicate::str::contains(
            "Sources:\n- example.com https://example.com/kenobi",
        ));
}

#[test]
fn test_sessions_show_unknown_id_fails() {
    let home = TempDir::new().unwrap();
    seed_history(&home);

    cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "show", "chat_404"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session 'chat_404' not found"));
}

#[test]
fn test_sessions_delete_persists() {
    let home = TempDir::new().unwrap();
    seed_history(&home);

    cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "delete", "chat_2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted session chat_2"));

    let history = stored_history(&home);
    let ids: Vec<&String> = history.as_object().unwrap().keys().collect();
    assert_eq!(ids, ["chat_1"]);
}

#[test]
fn test_deleting_last_session_leaves_a_fresh_one() {
    let home = TempDir::new().unwrap();
    seed_history(&home);

    for id in ["chat_1", "chat_2"] {
        cargo_bin_cmd!("mmchat")
            .env("MMCHAT_HOME", home.path())
            .args(["sessions", "delete", id])
            .assert()
            .success();
    }

    let history = stored_history(&home);
    let sessions = history.as_object().unwrap();
    assert_eq!(sessions.len(), 1);
    let (id, session) = sessions.iter().next().unwrap();
    assert!(id.starts_with("chat_"));
    assert_eq!(session["title"], "New Chat");
    assert_eq!(session["messages"], json!([]));
}

#[test]
fn test_sessions_new_appends_session() {
    let home = TempDir::new().unwrap();
    seed_history(&home);

    let output = cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "new"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let id = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert!(id.starts_with("chat_"));

    let history = stored_history(&home);
    let ids: Vec<&String> = history.as_object().unwrap().keys().collect();
    assert_eq!(ids, ["chat_1", "chat_2", id.as_str()]);
}

#[test]
fn test_corrupt_history_is_reported() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("chatHistory.json"), "{not json").unwrap();

    cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read chat history"));
}

#[test]
fn test_delete_unknown_id_leaves_corrupt_history_untouched() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("chatHistory.json");
    fs::write(&path, "{not json").unwrap();

    cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "delete", "chat_404"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("read chat history"));

    assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
}

#[test]
fn test_delete_unknown_id_on_empty_home_creates_nothing() {
    let home = TempDir::new().unwrap();

    cargo_bin_cmd!("mmchat")
        .env("MMCHAT_HOME", home.path())
        .args(["sessions", "delete", "chat_404"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session 'chat_404' not found"));

    assert!(!home.path().join("chatHistory.json").exists());
}
