use core_logic::CyclePolicy;
use game_farmer::config::{FarmerConfig, RewardPolicy, StartFailurePolicy};
use std::io::Write;
use std::path::Path;

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
accounts_file = "accounts.txt"
excluded_task_ids = ["t-1"]
display_timezone = "Asia/Jakarta"

[action_delay]
min_ms = 100
max_ms = 200

[api]
gateway_url = "https://gateway.example.com"
game_url = "https://game.example.com"

[tasks]
on_start_failure = "claim_anyway"

[mini_game]
max_attempts = 4

[mini_game.reward]
kind = "range"
min = 180
max = 220

[scheduler]
concurrency = 4
max_cycles = 2

[scheduler.cycle]
mode = "fixed_delay"
secs = 900
"#,
    );

    let config = FarmerConfig::load(file.path().to_str().unwrap()).unwrap();

    let dir = file.path().parent().unwrap();
    assert_eq!(Path::new(&config.accounts_file), dir.join("accounts.txt"));
    assert_eq!(config.excluded_task_ids, vec!["t-1"]);
    assert_eq!(config.action_delay.min_ms, 100);
    assert_eq!(config.tasks.on_start_failure, StartFailurePolicy::ClaimAnyway);
    assert_eq!(config.mini_game.max_attempts, 4);
    assert_eq!(config.mini_game.game_duration_secs, 30);
    assert_eq!(
        config.mini_game.reward,
        RewardPolicy::Range { min: 180, max: 220 }
    );
    assert_eq!(config.scheduler.concurrency, 4);
    assert_eq!(config.scheduler.max_cycles, Some(2));
    assert_eq!(config.scheduler.cycle, CyclePolicy::FixedDelay { secs: 900 });
}

#[test]
fn test_load_minimal_config_uses_defaults() {
    let file = write_config(
        r#"
[api]
gateway_url = "https://gateway.example.com"
game_url = "https://game.example.com"
"#,
    );

    let config = FarmerConfig::load(file.path().to_str().unwrap()).unwrap();

    let dir = file.path().parent().unwrap();
    assert_eq!(Path::new(&config.accounts_file), dir.join("data.txt"));
    assert_eq!(config.scheduler.concurrency, 10);
    assert_eq!(config.scheduler.cycle, CyclePolicy::default());
    assert_eq!(config.auth.attempts, 3);
    assert!(config.tasks.enabled);
    assert_eq!(config.mini_game.reward, RewardPolicy::Fixed { points: 2000 });
}

#[test]
fn test_data_files_are_found_next_to_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("excluded_tasks.json"), r#"["t-9"]"#).unwrap();
    let config_path = dir.path().join("farmer.toml");
    std::fs::write(
        &config_path,
        r#"
excluded_tasks_file = "excluded_tasks.json"

[api]
gateway_url = "https://gateway.example.com"
game_url = "https://game.example.com"
"#,
    )
    .unwrap();

    let config = FarmerConfig::load(config_path.to_str().unwrap()).unwrap();
    let excluded =
        core_logic::ExcludedTaskSet::load(config.excluded_tasks_file.as_deref().unwrap()).unwrap();

    assert!(excluded.contains("t-9"));
    assert_eq!(Path::new(&config.accounts_file), dir.path().join("data.txt"));
}

#[test]
fn test_load_rejects_invalid_url() {
    let file = write_config(
        r#"
[api]
gateway_url = "gateway"
game_url = "https://game.example.com"
"#,
    );

    let err = FarmerConfig::load(file.path().to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("api.gateway_url"));
}

#[test]
fn test_load_missing_file_fails() {
    assert!(FarmerConfig::load("/nonexistent/farmer.toml").is_err());
}

#[test]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml");
    let config = FarmerConfig::load(path).unwrap();
    assert_eq!(config.display_timezone, "Asia/Jakarta");
    let excluded =
        core_logic::ExcludedTaskSet::load(config.excluded_tasks_file.as_deref().unwrap()).unwrap();
    assert!(excluded.contains("5daf7250-76cc-4851-ac44-4c7fdcfe5994"));
}
