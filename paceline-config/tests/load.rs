use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use paceline_config::models::{CONFIG_JSON_ENV, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE};
use paceline_config::{ConfigLoadError, ConfigSource, PacelineConfig};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn nothing_configured_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (config, source) = PacelineConfig::load_with(env(&[]), dir.path()).unwrap();
    assert_eq!(source, ConfigSource::Default);
    assert_eq!(config, PacelineConfig::default());
}

#[test]
fn default_file_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_CONFIG_FILE);
    fs::write(&path, "store_path = \"speeds.json\"\n[timing]\nroute_settle_ms = 2000\n").unwrap();

    let (config, source) = PacelineConfig::load_with(env(&[]), dir.path()).unwrap();
    assert_eq!(source, ConfigSource::File(path));
    assert_eq!(config.store_path, PathBuf::from("speeds.json"));
    assert_eq!(config.timing.route_settle_ms, 2_000);
    assert_eq!(config.timing.player_settle_ms, 500);
}

#[test]
fn env_path_beats_inline_json_and_default_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "debug = false\n").unwrap();
    let custom = dir.path().join("custom.json");
    fs::write(&custom, r#"{"debug": true, "retry": {"max_attempts": 5}}"#).unwrap();
    let custom_str = custom.display().to_string();

    let (config, source) = PacelineConfig::load_with(
        env(&[
            (CONFIG_PATH_ENV, custom_str.as_str()),
            (CONFIG_JSON_ENV, r#"{"debug": false}"#),
        ]),
        dir.path(),
    )
    .unwrap();
    assert_eq!(source, ConfigSource::EnvPath(custom));
    assert!(config.debug);
    assert_eq!(config.retry.max_attempts, 5);
}

#[test]
fn inline_json_beats_default_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "debug = false\n").unwrap();

    let (config, source) = PacelineConfig::load_with(
        env(&[
            (CONFIG_PATH_ENV, "   "),
            (CONFIG_JSON_ENV, r#"{"site": {"host": "youtube-nocookie.com"}}"#),
        ]),
        dir.path(),
    )
    .unwrap();
    assert_eq!(source, ConfigSource::EnvInline);
    assert_eq!(config.site.host, "youtube-nocookie.com");
    assert_eq!(config.site.watch_path, "/watch");
}

#[test]
fn invalid_values_fail_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let err = PacelineConfig::load_with(
        env(&[(CONFIG_JSON_ENV, r#"{"retry": {"max_attempts": 0}}"#)]),
        dir.path(),
    )
    .unwrap_err();
    assert!(err.to_string().contains(CONFIG_JSON_ENV));
    assert!(matches!(
        err.downcast_ref::<ConfigLoadError>(),
        Some(ConfigLoadError::Invalid(_))
    ));
}

#[test]
fn missing_env_path_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let missing_str = missing.display().to_string();
    let err = PacelineConfig::load_with(env(&[(CONFIG_PATH_ENV, missing_str.as_str())]), dir.path())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigLoadError>(),
        Some(ConfigLoadError::Read { .. })
    ));
}
