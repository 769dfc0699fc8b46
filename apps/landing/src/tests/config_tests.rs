use super::{apply_env, apply_file, Settings};

use std::{collections::HashMap, path::Path, time::Duration};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn defaults_match_documented_timings() {
    let settings = Settings::default();
    assert_eq!(settings.loops.rotation_period_ms, 3_000);
    assert_eq!(settings.loops.char_delay_ms, 50);
    assert_eq!(settings.loops.hold_delay_ms, 2_500);
    assert_eq!(settings.request_timeout_secs, 60);
    assert_eq!(
        settings.service_config().request_timeout,
        Some(Duration::from_secs(60))
    );
}

#[test]
fn file_values_override_defaults_and_keep_missing_ones() {
    let raw = r#"
        text_model = "custom-text"
        request_timeout_secs = 0

        [loops]
        char_delay_ms = 20
    "#;
    let settings = apply_file(Settings::default(), raw, Path::new("landing.toml"));
    assert_eq!(settings.text_model, "custom-text");
    assert_eq!(settings.image_model, Settings::default().image_model);
    assert_eq!(settings.loops.char_delay_ms, 20);
    assert_eq!(settings.loops.rotation_period_ms, 3_000);
    assert_eq!(settings.service_config().request_timeout, None);
}

#[test]
fn malformed_file_is_ignored() {
    let mut base = Settings::default();
    base.text_model = "kept".into();
    let settings = apply_file(base.clone(), "text_model = [", Path::new("landing.toml"));
    assert_eq!(settings, base);
}

#[test]
fn env_overrides_win_over_file() {
    let mut settings = apply_file(
        Settings::default(),
        "api_base_url = \"http://file.example/\"",
        Path::new("landing.toml"),
    );
    apply_env(
        &mut settings,
        env_from(&[
            ("APP__API_BASE_URL", "http://env.example/"),
            ("APP__API_KEY", "env-key"),
            ("APP__ROTATION_PERIOD_MS", "1200"),
            ("APP__HOLD_DELAY_MS", "soon"),
        ]),
    );
    assert_eq!(settings.api_base_url, "http://env.example/");
    assert_eq!(settings.api_key.as_deref(), Some("env-key"));
    assert_eq!(settings.loops.rotation_period_ms, 1_200);
    assert_eq!(settings.loops.hold_delay_ms, 2_500);
    assert!(settings.service_config().api_key.is_some());
}

#[test]
fn explicit_download_dir_is_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().to_str().expect("utf8 path");
    let mut settings = Settings::default();
    apply_env(&mut settings, env_from(&[("APP__DOWNLOAD_DIR", path)]));
    assert_eq!(settings.download_dir(), dir.path());
}
