use nerd_core::config::Config;

#[test]
fn default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.accounts.strategy, "sticky");
    assert_eq!(cfg.accounts.bucket_max_tokens, 60);
    assert_eq!(cfg.health.initial, 70);
    assert_eq!(cfg.health.min_usable, 30);
    assert_eq!(cfg.health.max_score, 100);
    assert_eq!(cfg.init.max_concurrent_kb_builds, 3);
    assert!(cfg.init.skip_dirs.contains(&"node_modules".to_string()));
}

#[test]
fn config_roundtrip() {
    let cfg = Config::default();
    let toml_str = cfg.to_toml().expect("serialize to toml");
    assert!(toml_str.contains("sticky"));

    let parsed: Config = toml::from_str(&toml_str).expect("parse toml back");
    assert_eq!(parsed.accounts.strategy, cfg.accounts.strategy);
    assert_eq!(parsed.health.max_score, cfg.health.max_score);
}

#[test]
fn config_partial_toml() {
    let partial = r#"
[accounts]
strategy = "hybrid"

[health]
min_usable = 40
"#;
    let cfg: Config = toml::from_str(partial).expect("parse partial");
    assert_eq!(cfg.accounts.strategy, "hybrid");
    assert_eq!(cfg.health.min_usable, 40);
    // defaults should fill in the rest
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.health.initial, 70);
}

#[test]
fn load_from_missing_path_errors() {
    let err = Config::load_from("/nonexistent/path/that/does/not/exist.toml")
        .expect_err("missing file should error");
    assert!(matches!(err, nerd_core::config::ConfigError::Io(_)));
}

#[test]
fn save_and_load_roundtrip() {
    let dir = std::env::temp_dir().join(format!("nerd-config-test-{}", uuid::Uuid::new_v4()));
    let path = dir.join("config.toml");

    let mut cfg = Config::default();
    cfg.accounts.strategy = "hybrid".into();
    cfg.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.accounts.strategy, "hybrid");

    let _ = std::fs::remove_dir_all(&dir);
}
