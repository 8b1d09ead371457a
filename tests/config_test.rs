use std::fs;

use astroweather::config::AppConfig;
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::from_file(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn file_values_override_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("astroweather.json");
    fs::write(
        &path,
        r#"{
            "database_path": "/var/lib/astro/db.sqlite3",
            "location": { "latitude": 47.1, "longitude": 8.3, "timezone": "Europe/Zurich" },
            "windows": { "threshold": 65, "gap_tolerance_hours": 2 },
            "reconciliation": { "tolerance_minutes": 15 },
            "sources": { "cloudwatcher": { "host": "10.0.0.5" } }
        }"#,
    )
    .unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    assert_eq!(config.location.latitude, 47.1);
    assert_eq!(config.location.tz().unwrap(), chrono_tz::Europe::Zurich);
    assert_eq!(config.windows.threshold, 65);
    assert_eq!(config.windows.gap_tolerance_hours, 2);
    assert_eq!(config.windows.min_duration_hours, 2);
    assert_eq!(config.reconciliation.tolerance(), chrono::Duration::minutes(15));
    assert_eq!(config.sources.cloudwatcher.host.as_deref(), Some("10.0.0.5"));
    assert_eq!(config.sources.cloudwatcher.port, 80);
    assert!(config
        .validate()
        .iter()
        .all(|w| !w.contains("CLOUDWATCHER_HOST")));
}

#[test]
fn malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"windows\": ").unwrap();

    let err = AppConfig::from_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.json"));
}
