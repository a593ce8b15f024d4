use crate::error::InkError;
use crate::export::DEFAULT_MAX_EXPORT_SCALE;
use crate::recognition::DEFAULT_RECOGNITION_SCALE;
use crate::thumbnail::DEFAULT_THUMBNAIL_WIDTH;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime settings for [`crate::InkRender`]. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub thumbnail_width: u32,
    pub recognition_scale: f64,
    pub max_export_scale: f64,
    pub cache_dir: PathBuf,
    pub perf_log: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            recognition_scale: DEFAULT_RECOGNITION_SCALE,
            max_export_scale: DEFAULT_MAX_EXPORT_SCALE,
            cache_dir: PathBuf::from("thumbnails"),
            perf_log: None,
        }
    }
}

impl RenderConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, InkError> {
        let config: RenderConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InkError> {
        if self.thumbnail_width == 0 {
            return Err(InkError::InvalidConfiguration(
                "thumbnail_width must be greater than zero".to_string(),
            ));
        }
        let scale = self.recognition_scale;
        if !scale.is_finite() || scale <= 0.0 || scale > 1.0 {
            return Err(InkError::InvalidConfiguration(format!(
                "recognition_scale {scale} must be in (0, 1]"
            )));
        }
        let max = self.max_export_scale;
        if !max.is_finite() || max <= 0.0 {
            return Err(InkError::InvalidConfiguration(format!(
                "max_export_scale {max} must be a positive number"
            )));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(InkError::InvalidConfiguration(
                "cache_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = RenderConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.thumbnail_width, 200);
        assert_eq!(config.recognition_scale, 0.5);
        assert_eq!(config.cache_dir, PathBuf::from("thumbnails"));
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config =
            RenderConfig::from_json_str(r#"{"thumbnail_width":320,"perf_log":"perf.jsonl"}"#)
                .unwrap();
        assert_eq!(config.thumbnail_width, 320);
        assert_eq!(config.perf_log, Some(PathBuf::from("perf.jsonl")));
        assert_eq!(config.max_export_scale, 4.0);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for raw in [
            r#"{"thumbnail_width":0}"#,
            r#"{"recognition_scale":0}"#,
            r#"{"recognition_scale":1.5}"#,
            r#"{"max_export_scale":-2}"#,
            r#"{"cache_dir":""}"#,
        ] {
            let err = RenderConfig::from_json_str(raw).unwrap_err();
            assert!(matches!(err, InkError::InvalidConfiguration(_)), "{raw}");
        }
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = RenderConfig::from_json_str("{thumbnail_width:").unwrap_err();
        assert!(matches!(err, InkError::Json(_)));
    }
}
