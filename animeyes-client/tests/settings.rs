use std::io::Write;

use animeyes_client::{
    AppContext, Tab,
    settings::{
        ClientSettings, MAX_SETTINGS_BYTES, load_settings, load_settings_from_path, log_path_for,
        parse_settings_json, save_settings_with_retry,
    },
};

#[test]
fn load_settings_ignores_oversized_file() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = dir.path().join("settings.json");

    let mut file = std::fs::File::create(&path).expect("create settings.json");
    file.write_all(&vec![b'a'; (MAX_SETTINGS_BYTES as usize) + 1024])
        .expect("write oversized settings.json");
    drop(file);

    let err = load_settings_from_path(&path).expect_err("oversized file should error");
    let msg = err.to_string();
    assert!(msg.contains("too large"), "unexpected error: {msg}");
    assert_eq!(load_settings(&path), ClientSettings::default());
}

#[test]
fn missing_or_corrupt_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = dir.path().join("settings.json");
    assert_eq!(load_settings(&path), ClientSettings::default());

    std::fs::write(&path, "{ not json").expect("write corrupt settings");
    assert_eq!(load_settings(&path), ClientSettings::default());
}

#[test]
fn saved_settings_restore_tab_and_lid_link() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = dir.path().join("settings.json");

    let settings = ClientSettings {
        device_url: Some("http://eyes.local".to_owned()),
        active_tab: Tab::Calibration,
        lid_link: true,
    };
    save_settings_with_retry(&path, &settings).expect("save settings");
    assert!(!dir.path().join("settings.json.tmp").exists());

    let restored = load_settings(&path);
    assert_eq!(restored, settings);

    let app = AppContext::new(&restored);
    assert_eq!(app.tab(), Tab::Calibration);
    assert!(app.lid_link());
}

#[test]
fn partial_json_uses_field_defaults() {
    let settings = parse_settings_json(r#"{"active_tab":"console"}"#).expect("parse");
    assert_eq!(settings.active_tab, Tab::Console);
    assert_eq!(settings.device_url, None);
    assert!(!settings.lid_link);
}

#[test]
fn log_file_sits_beside_settings() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = dir.path().join("settings.json");
    assert_eq!(
        log_path_for(&path),
        dir.path().join("logs").join("animeyes.log")
    );
    assert_eq!(
        log_path_for(std::path::Path::new("settings.json")),
        std::path::Path::new("logs").join("animeyes.log")
    );
}
