use serial_test::serial;

use super::*;

#[test]
#[serial]
fn defaults_load_without_any_source() {
    let settings = load(&CliArgs::default()).expect("valid settings");

    assert_eq!(settings.server.listen, DEFAULT_LISTEN.parse().unwrap());
    assert_eq!(settings.cache.memory_max_entries, 500);
    assert_eq!(settings.cache.default_ttl_secs, 300);
    assert!(!settings.remote.enabled);
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.logging.format, LogFormat::Compact);
}

#[test]
#[serial]
fn cli_overrides_take_highest_precedence() {
    let cli = CliArgs {
        listen: Some("0.0.0.0:9000".parse().unwrap()),
        memory_max_entries: Some(42),
        default_ttl_secs: Some(7),
        log_level: Some("debug".to_string()),
        log_json: Some(true),
        ..Default::default()
    };

    let settings = load(&cli).expect("valid settings");

    assert_eq!(settings.server.listen.port(), 9000);
    assert_eq!(settings.cache.memory_max_entries, 42);
    assert_eq!(settings.cache.default_ttl_secs, 7);
    assert_eq!(settings.logging.level, "debug");
    assert_eq!(settings.logging.format, LogFormat::Json);
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    // The `config` crate lower-cases env keys; STRATO__CACHE__DEBOUNCE_MS
    // lands on cache.debounce_ms.
    unsafe { std::env::set_var("STRATO__CACHE__DEBOUNCE_MS", "250") };
    let settings = load(&CliArgs::default()).expect("valid settings");
    unsafe { std::env::remove_var("STRATO__CACHE__DEBOUNCE_MS") };

    assert_eq!(settings.cache.debounce_ms, 250);
}

#[test]
#[serial]
fn enabling_remote_without_url_is_rejected() {
    let cli = CliArgs {
        remote_enabled: Some(true),
        ..Default::default()
    };

    assert!(matches!(load(&cli), Err(ConfigError::RemoteUrlMissing)));
}

#[test]
#[serial]
fn remote_url_scheme_is_validated() {
    let cli = CliArgs {
        remote_enabled: Some(true),
        remote_url: Some("http://localhost:6379".to_string()),
        ..Default::default()
    };

    assert!(matches!(load(&cli), Err(ConfigError::RemoteUrl { .. })));

    let cli = CliArgs {
        remote_enabled: Some(true),
        remote_url: Some("redis://localhost:6379".to_string()),
        ..Default::default()
    };

    let settings = load(&cli).expect("valid settings");
    assert!(settings.remote.enabled);
}

#[test]
fn cache_settings_convert_to_engine_config() {
    let settings = CacheSettings {
        memory_max_entries: 64,
        debounce_ms: 10,
        ..Default::default()
    };

    let config = crate::cache::CacheConfig::from(&settings);
    assert_eq!(config.memory_max_entries, 64);
    assert_eq!(config.debounce_ms, 10);
    assert_eq!(config.default_ttl_secs, settings.default_ttl_secs);
}
