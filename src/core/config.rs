use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::core::errors::{AppError, AppResult};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub language: String,
    pub summary_enabled: bool,
    pub model: String,
    #[serde(with = "duration_secs")]
    pub call_timeout: Duration,
    pub max_retries: u32,
    pub render_scale: f32,
    pub jpeg_quality: u8,
    pub crop_padding_px: u32,
    pub max_display_size: u32,
    pub summary_char_budget: usize,
    pub excerpt_char_budget: usize,
    pub pdfium_library_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            summary_enabled: false,
            model: DEFAULT_MODEL.to_string(),
            call_timeout: Duration::from_secs(120),
            max_retries: 2,
            render_scale: 2.0,
            jpeg_quality: 90,
            crop_padding_px: crate::raster::crop::DEFAULT_PADDING_PX,
            max_display_size: 450,
            summary_char_budget: 60_000,
            excerpt_char_budget: 200,
            pdfium_library_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Overlays variables returned by `lookup` on the defaults.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(language) = lookup("SCAN_ASSEMBLER_LANGUAGE") {
            if language.trim().is_empty() {
                return Err(AppError::Configuration(
                    "SCAN_ASSEMBLER_LANGUAGE cannot be empty".to_string(),
                ));
            }
            config.language = language.trim().to_string();
        }
        if let Some(raw) = lookup("SCAN_ASSEMBLER_SUMMARY") {
            config.summary_enabled = parse_flag("SCAN_ASSEMBLER_SUMMARY", &raw)?;
        }
        if let Some(model) = lookup("SCAN_ASSEMBLER_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Some(raw) = lookup("SCAN_ASSEMBLER_TIMEOUT_SECS") {
            let secs: u64 = parse_number("SCAN_ASSEMBLER_TIMEOUT_SECS", &raw)?;
            if secs == 0 {
                return Err(AppError::Configuration(
                    "SCAN_ASSEMBLER_TIMEOUT_SECS must be positive".to_string(),
                ));
            }
            config.call_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("SCAN_ASSEMBLER_MAX_RETRIES") {
            config.max_retries = parse_number("SCAN_ASSEMBLER_MAX_RETRIES", &raw)?;
        }
        if let Some(dir) = lookup("PDFIUM_DYNAMIC_LIB_PATH") {
            if !dir.trim().is_empty() {
                config.pdfium_library_dir = Some(PathBuf::from(dir.trim()));
            }
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, raw: &str) -> AppResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(AppError::Configuration(format!(
            "{key} expects a boolean, got '{other}'"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::Configuration(format!("{key} expects a number, got '{raw}'")))
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }
}
