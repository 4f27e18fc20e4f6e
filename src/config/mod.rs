//! Application configuration loaded from a JSON file.
//!
//! Every section has defaults, so a minimal file only names the source.
//! Without a `profile` the performance profile is picked from the machine's
//! CPU count and memory:
//!
//! ```json
//! { "source": { "kind": "sequence", "dir": "recordings/run1" } }
//! ```
use crate::detector::{DetectionSettings, PerformanceProfile, SettingsError};
use crate::pipeline::PipelineConfig;
use crate::relay::{RelayConfig, RelayError};
use crate::report::ReporterConfig;
use crate::roi::RegionOfInterest;
use crate::source::{FfmpegConfig, SourceConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("invalid {section} configuration: {reason}")]
    Invalid {
        section: &'static str,
        reason: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub roi: RegionOfInterest,
    /// Picked from the hardware by [`load_config`] when absent.
    pub profile: Option<PerformanceProfile>,
    /// Explicit settings; when absent they come from `profile`.
    pub detection: Option<DetectionSettings>,
    pub pipeline: PipelineConfig,
    /// Reject relay; `None` runs without one.
    pub relay: Option<RelayConfig>,
    pub reporter: ReporterConfig,
}

impl AppConfig {
    pub fn profile(&self) -> PerformanceProfile {
        self.profile.unwrap_or_default()
    }

    pub fn detection_settings(&self) -> DetectionSettings {
        self.detection
            .clone()
            .unwrap_or_else(|| DetectionSettings::for_profile(self.profile()))
    }

    fn live_camera(&self) -> Option<&FfmpegConfig> {
        match &self.source {
            SourceConfig::Ffmpeg(cfg) if cfg.is_live() => Some(cfg),
            _ => None,
        }
    }

    /// Source configuration with the profile's camera rate filled in.
    pub fn resolved_source(&self) -> SourceConfig {
        match self.live_camera() {
            Some(cfg) if cfg.fps.is_none() => SourceConfig::Ffmpeg(FfmpegConfig {
                fps: Some(self.profile().camera_fps()),
                ..cfg.clone()
            }),
            _ => self.source.clone(),
        }
    }

    /// Pipeline configuration with profile defaults filled in. A live
    /// camera is also capped at the camera rate.
    pub fn resolved_pipeline(&self) -> PipelineConfig {
        let profile = self.profile();
        let max_frame_rate = self.pipeline.max_frame_rate.or_else(|| {
            self.live_camera()
                .map(|cfg| f64::from(cfg.fps.unwrap_or_else(|| profile.camera_fps())))
        });
        PipelineConfig {
            max_frame_rate,
            max_captures_per_second: Some(
                self.pipeline
                    .max_captures_per_second
                    .unwrap_or_else(|| profile.max_captures_per_second()),
            ),
            ..self.pipeline.clone()
        }
    }

    pub fn max_defect_images(&self) -> usize {
        self.reporter
            .max_defect_images
            .unwrap_or_else(|| self.profile().max_defect_images())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection_settings().validate()?;
        self.pipeline
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                section: "pipeline",
                reason,
            })?;
        if let Some(relay) = &self.relay {
            relay.validate().map_err(|err| ConfigError::Invalid {
                section: "relay",
                reason: match err {
                    RelayError::Config(reason) => reason,
                    other => other.to_string(),
                },
            })?;
        }
        Ok(())
    }
}

/// Read, parse and validate an [`AppConfig`].
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: AppConfig =
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if config.profile.is_none() {
        config.profile = Some(PerformanceProfile::detect());
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_uses_profile_defaults() {
        let file = write_config(
            r#"{
                "source": { "kind": "still", "path": "board.png" },
                "profile": "low",
                "roi": { "kind": "rect", "x": 10, "y": 20, "width": 100, "height": 50 }
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Still {
                path: PathBuf::from("board.png")
            }
        );
        assert_eq!(config.detection_settings().detection_interval_ms, 1000);
        assert_eq!(config.max_defect_images(), 50);
        assert_eq!(config.resolved_pipeline().max_captures_per_second, Some(3));
        assert_eq!(config.resolved_pipeline().max_frame_rate, None);
        assert_eq!(config.resolved_source(), config.source);
        assert!(config.relay.is_none());
        assert!(!config.roi.is_none());
    }

    #[test]
    fn missing_profile_is_detected_from_hardware() {
        let file = write_config("{}");
        let config = load_config(file.path()).unwrap();
        assert!(config.profile.is_some());
    }

    #[test]
    fn camera_rate_follows_the_profile() {
        let file = write_config(
            r#"{
                "source": { "kind": "ffmpeg", "uri": "/dev/video0" },
                "profile": "high"
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        match config.resolved_source() {
            SourceConfig::Ffmpeg(cfg) => assert_eq!(cfg.fps, Some(30)),
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(config.resolved_pipeline().max_frame_rate, Some(30.0));

        let file = write_config(
            r#"{
                "source": { "kind": "ffmpeg", "uri": "0", "fps": 10 },
                "pipeline": { "max_frame_rate": 5.0 },
                "profile": "high"
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.resolved_source(), config.source);
        assert_eq!(config.resolved_pipeline().max_frame_rate, Some(5.0));
    }

    #[test]
    fn reject_pulse_length_comes_from_the_relay_section() {
        let file = write_config(r#"{ "relay": { "trigger_duration_ms": 250 } }"#);
        let relay = load_config(file.path()).unwrap().relay.unwrap();
        assert_eq!(relay.trigger_duration(), std::time::Duration::from_millis(250));

        let file = write_config(r#"{ "relay": { "trigger_duration_ms": 0 } }"#);
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Invalid {
                section: "relay",
                ..
            })
        ));
    }

    #[test]
    fn relay_section_fills_missing_fields() {
        let file = write_config(r#"{ "relay": { "port": "COM3" } }"#);
        let relay = load_config(file.path()).unwrap().relay.unwrap();
        assert_eq!(relay.port, "COM3");
        assert_eq!(relay.baud_rate, 9600);
        assert_eq!(relay.protocol.on, vec![0xA0, 0x01, 0x01, 0xA2]);
    }

    #[test]
    fn invalid_settings_are_reported() {
        let file = write_config(
            r#"{ "detection": { "defect_min_deg": 120.0, "defect_max_deg": 100.0 } }"#,
        );
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Settings(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let file = write_config("{ not json");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            load_config(Path::new("/nonexistent/board-align.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
