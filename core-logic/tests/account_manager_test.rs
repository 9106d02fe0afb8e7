use core_logic::{AccountManager, ConfigError, ExcludedTaskSet};
use std::io::Write;
use tempfile::NamedTempFile;

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_accounts_from_file() {
    let file = temp_file("query_id=aaa\n\nquery_id=bbb\r\nquery_id=ccc\n");
    let manager = AccountManager::load(file.path()).unwrap();

    assert_eq!(manager.count(), 3);
    let creds: Vec<&str> = manager.accounts().iter().map(|a| a.credential()).collect();
    assert_eq!(creds, vec!["query_id=aaa", "query_id=bbb", "query_id=ccc"]);
}

#[test]
fn test_empty_account_list_is_rejected() {
    let file = temp_file("\n  \n\r\n");
    let err = AccountManager::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("contains no credentials"));
}

#[test]
fn test_missing_account_list_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(AccountManager::load(dir.path().join("data.txt")).is_err());
}

#[test]
fn test_excluded_tasks_loaded_from_json_array() {
    let file = temp_file(r#"["task-a", "task-b"]"#);
    let set = ExcludedTaskSet::load(file.path()).unwrap();

    assert_eq!(set.len(), 2);
    assert!(set.contains("task-a"));
    assert!(set.contains("task-b"));
    assert!(!set.contains("task-c"));
}

#[test]
fn test_missing_excluded_tasks_file_yields_empty_set() {
    let dir = tempfile::tempdir().unwrap();
    let set = ExcludedTaskSet::load(dir.path().join("excluded.json")).unwrap();
    assert!(set.is_empty());
}

#[test]
fn test_malformed_excluded_tasks_file_is_reported() {
    let file = temp_file(r#"{"task-a": true}"#);
    match ExcludedTaskSet::load(file.path()) {
        Err(ConfigError::MalformedJson { .. }) => {}
        other => panic!("Expected MalformedJson, got {:?}", other),
    }
}

#[test]
fn test_excluded_set_merges_configured_ids() {
    let mut set = ExcludedTaskSet::from_ids(["task-a"]);
    set.extend(vec!["task-b".to_string()]);
    assert_eq!(set.len(), 2);
    assert!(set.contains("task-b"));
}
