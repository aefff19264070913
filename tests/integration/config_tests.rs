use figment::providers::{Env, Serialized};
use figment::Figment;
use fileorg::config::Config;
use fileorg::duplicates::KeepStrategy;
use fileorg::scanner::ScanOptions;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("FILEORG_TEST_HASH_THREADS", "16");
    std::env::set_var("FILEORG_TEST_KEEP_STRATEGY", "shortest_path");

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("FILEORG_TEST_").split("__"));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.hash_threads, 16);
    assert_eq!(config.keep_strategy, KeepStrategy::ShortestPath);

    std::env::remove_var("FILEORG_TEST_HASH_THREADS");
    std::env::remove_var("FILEORG_TEST_KEEP_STRATEGY");
}

#[test]
fn test_config_load_from_toml() {
    let state = tempdir().unwrap();
    fs::write(
        state.path().join("config.toml"),
        r#"
keep_strategy = "oldest"
include_hidden = true
exclude_dirs = ["target"]
verify_content_on_undo = true
"#,
    )
    .unwrap();

    let config = Config::try_load(state.path()).unwrap();

    assert_eq!(config.keep_strategy, KeepStrategy::Oldest);
    assert!(config.include_hidden);
    assert_eq!(config.exclude_dirs, vec!["target".to_string()]);
    assert!(config.verify_content_on_undo);
    assert_eq!(config.state_dir, state.path());
    assert_eq!(config.log_path(), state.path().join("operations.db"));
}

#[test]
fn test_invalid_toml_falls_back_to_defaults() {
    let state = tempdir().unwrap();
    fs::write(state.path().join("config.toml"), "keep_strategy = \"largest\"").unwrap();

    assert!(Config::try_load(state.path()).is_err());

    let config = Config::load(Some(state.path()));
    assert_eq!(config.keep_strategy, KeepStrategy::Newest);
    assert_eq!(config.state_dir, state.path());
}

#[test]
fn test_save_then_load() {
    let state = tempdir().unwrap();
    let config = Config {
        state_dir: state.path().to_path_buf(),
        keep_strategy: KeepStrategy::First,
        use_cache: false,
        ..Config::default()
    };

    config.save(&config.config_path()).unwrap();
    let loaded = Config::try_load(state.path()).unwrap();

    assert_eq!(loaded.keep_strategy, KeepStrategy::First);
    assert!(!loaded.use_cache);
}

#[test]
fn test_scan_options_from_config() {
    let config = Config {
        state_dir: PathBuf::from("/unused"),
        exclude_dirs: vec!["vendor".to_string()],
        include_hidden: true,
        use_cache: false,
        hash_threads: 0,
        ..Config::default()
    };

    let options = ScanOptions::from(&config);

    assert!(options.exclude_dirs.contains("vendor"));
    assert!(!options.exclude_dirs.contains(".git"));
    assert!(options.include_hidden);
    assert!(!options.use_cache);
    assert_eq!(options.hash_threads, 1);
}
