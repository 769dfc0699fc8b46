use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use client_core::{ApiKey, ServiceConfig, DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use motion::LoopTimings;
use serde::Deserialize;
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "landing.toml";
const SETTINGS_DIR: &str = "landing";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub text_model: String,
    pub image_model: String,
    /// Zero disables the timeout.
    pub request_timeout_secs: u64,
    pub download_dir: Option<PathBuf>,
    pub loops: LoopTimings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: DEFAULT_BASE_URL.into(),
            text_model: DEFAULT_TEXT_MODEL.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            request_timeout_secs: 60,
            download_dir: None,
            loops: LoopTimings::default(),
        }
    }
}

impl Settings {
    /// Client configuration. A key absent from settings falls back to
    /// `GEMINI_API_KEY` / `API_KEY`.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            base_url: self.api_base_url.clone(),
            text_model: self.text_model.clone(),
            image_model: self.image_model.clone(),
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
            api_key: ApiKey::resolve(self.api_key.as_deref()),
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Some(path) = settings_file() {
        match fs::read_to_string(&path) {
            Ok(raw) => settings = apply_file(settings, &raw, &path),
            Err(err) => warn!(path = %path.display(), %err, "failed to read settings file"),
        }
    }

    apply_env(&mut settings, |name| std::env::var(name).ok());
    settings
}

fn settings_file() -> Option<PathBuf> {
    let local = PathBuf::from(SETTINGS_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
        .filter(|path| path.is_file())
}

fn apply_file(settings: Settings, raw: &str, path: &Path) -> Settings {
    match toml::from_str::<Settings>(raw) {
        Ok(file_cfg) => {
            debug!(path = %path.display(), "loaded settings file");
            file_cfg
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring malformed settings file");
            settings
        }
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("APP__API_KEY") {
        settings.api_key = Some(v);
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__TEXT_MODEL") {
        settings.text_model = v;
    }
    if let Some(v) = var("APP__IMAGE_MODEL") {
        settings.image_model = v;
    }
    if let Some(v) = var("APP__DOWNLOAD_DIR") {
        settings.download_dir = Some(PathBuf::from(v));
    }

    if let Some(parsed) = parse_u64(&var, "APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = parsed;
    }
    if let Some(parsed) = parse_u64(&var, "APP__ROTATION_PERIOD_MS") {
        settings.loops.rotation_period_ms = parsed;
    }
    if let Some(parsed) = parse_u64(&var, "APP__CHAR_DELAY_MS") {
        settings.loops.char_delay_ms = parsed;
    }
    if let Some(parsed) = parse_u64(&var, "APP__HOLD_DELAY_MS") {
        settings.loops.hold_delay_ms = parsed;
    }
}

fn parse_u64(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = var(name)?;
    match raw.trim().parse::<u64>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(name, value = %raw, %err, "ignoring non-numeric override");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
