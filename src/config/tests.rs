use super::*;

fn raw() -> RawSettings {
    RawSettings::default()
}

#[test]
fn defaults_resolve() {
    let settings = Settings::from_raw(raw()).expect("defaults must be valid");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.cache.primary_url, None);
    assert_eq!(settings.cache.key_prefix, "rental_house:");
    assert_eq!(settings.cache.ttl_seconds, 86_400);
    assert_eq!(settings.cache.queue_capacity, 10_000);
    assert_eq!(settings.cache.poll_interval_ms, 250);
    assert_eq!(settings.cache.drain_batch_limit, 100);
    assert_eq!(settings.cache.refresh_cadence_seconds, 3_600);
}

#[test]
fn log_level_parses() {
    let mut raw = raw();
    raw.logging.level = Some("debug".into());
    raw.logging.json = Some(true);
    let settings = Settings::from_raw(raw).unwrap();
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn bad_log_level_is_rejected() {
    let mut raw = raw();
    raw.logging.level = Some("chatty".into());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "logging.level",
            ..
        })
    ));
}

#[test]
fn blank_urls_normalize_to_none() {
    let mut raw = raw();
    raw.cache.primary_url = Some("   ".into());
    let settings = Settings::from_raw(raw).unwrap();
    assert_eq!(settings.cache.primary_url, None);
}

#[test]
fn replica_without_primary_is_rejected() {
    let mut raw = raw();
    raw.cache.replica_url = Some("redis://replica:6379/0".into());
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.replica_url",
            ..
        })
    ));
}

#[test]
fn zero_ttl_is_rejected() {
    let mut raw = raw();
    raw.cache.ttl_seconds = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.ttl_seconds",
            ..
        })
    ));
}

#[test]
fn zero_queue_capacity_is_rejected() {
    let mut raw = raw();
    raw.cache.queue_capacity = Some(0);
    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "cache.queue_capacity",
            ..
        })
    ));
}

#[test]
fn cache_settings_feed_cache_config() {
    let mut raw = raw();
    raw.cache.key_prefix = Some("test:".into());
    raw.cache.ttl_seconds = Some(60);
    let settings = Settings::from_raw(raw).unwrap();

    let config = crate::cache::CacheConfig::from(&settings.cache);
    assert_eq!(config.key_prefix, "test:");
    assert_eq!(config.ttl_seconds, 60);
    assert_eq!(config.queue_capacity, 10_000);
}
