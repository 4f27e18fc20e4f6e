//! Settings that drive a detection pass and their validation.
//!
//! A [`DetectionSettings`] value is immutable for the duration of a cycle;
//! the pipeline swaps in a whole new value when the operator edits it.
//! Profiles bundle the cadence and Hough knobs for slower or faster
//! hardware.

use crate::edges::EdgeParams;
use crate::hough::HoughParams;
use log::info;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Classification of angles that fall in neither the tolerance band nor the
/// defect band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Reject the board.
    #[default]
    Misaligned,
    /// Let the board pass.
    Aligned,
}

/// Hardware presets trading detection cadence for CPU load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceProfile {
    High,
    #[default]
    Medium,
    Low,
}

impl PerformanceProfile {
    /// Profile for a machine with `cpus` logical cores and `memory_gb` of RAM.
    pub fn for_hardware(cpus: usize, memory_gb: f64) -> Self {
        if cpus >= 8 && memory_gb >= 16.0 {
            PerformanceProfile::High
        } else if cpus >= 4 && memory_gb >= 8.0 {
            PerformanceProfile::Medium
        } else {
            PerformanceProfile::Low
        }
    }

    /// Profile for this machine. Memory counts as 8 GB where the total
    /// cannot be read.
    pub fn detect() -> Self {
        let cpus = num_cpus::get();
        let memory_gb = total_memory_gb().unwrap_or(DEFAULT_MEMORY_GB);
        let profile = Self::for_hardware(cpus, memory_gb);
        info!("{cpus} cpu(s), {memory_gb:.1} GB memory: {profile:?} performance profile");
        profile
    }

    /// Capture rate requested from a camera.
    pub fn camera_fps(self) -> u32 {
        match self {
            PerformanceProfile::High => 30,
            PerformanceProfile::Medium => 25,
            PerformanceProfile::Low => 15,
        }
    }

    /// Retention cap for saved defect images.
    pub fn max_defect_images(self) -> usize {
        match self {
            PerformanceProfile::High => 200,
            PerformanceProfile::Medium => 100,
            PerformanceProfile::Low => 50,
        }
    }

    /// Attachment budget for defect frames.
    pub fn max_captures_per_second(self) -> u32 {
        match self {
            PerformanceProfile::High => 10,
            PerformanceProfile::Medium => 5,
            PerformanceProfile::Low => 3,
        }
    }
}

const DEFAULT_MEMORY_GB: f64 = 8.0;

fn total_memory_gb() -> Option<f64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_mem_total_kb(&meminfo).map(|kb| kb as f64 / (1024.0 * 1024.0))
}

/// `MemTotal` in kB from the contents of `/proc/meminfo`.
fn parse_mem_total_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub standard_angle_deg: f32,
    pub tolerance_deg: f32,
    pub defect_min_deg: f32,
    pub defect_max_deg: f32,
    pub gap_policy: GapPolicy,
    pub min_line_length_px: f32,
    pub max_line_gap_px: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub hough_threshold: u32,
    pub max_lines: usize,
    pub blur: bool,
    pub detection_interval_ms: u64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            standard_angle_deg: 90.0,
            tolerance_deg: 5.0,
            defect_min_deg: 80.0,
            defect_max_deg: 100.0,
            gap_policy: GapPolicy::Misaligned,
            min_line_length_px: 20.0,
            max_line_gap_px: 10,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_threshold: 50,
            max_lines: 20,
            blur: true,
            detection_interval_ms: 500,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    #[error("invalid detection settings: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl DetectionSettings {
    /// Default classification bands with the profile's cadence and line
    /// extraction knobs.
    pub fn for_profile(profile: PerformanceProfile) -> Self {
        let (interval, min_len, max_gap, threshold) = match profile {
            PerformanceProfile::High => (200, 30.0, 15, 60),
            PerformanceProfile::Medium => (500, 50.0, 20, 80),
            PerformanceProfile::Low => (1000, 80.0, 30, 100),
        };
        Self {
            detection_interval_ms: interval,
            min_line_length_px: min_len,
            max_line_gap_px: max_gap,
            hough_threshold: threshold,
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn edge_params(&self) -> EdgeParams {
        EdgeParams {
            canny_low: self.canny_low,
            canny_high: self.canny_high,
            blur: self.blur,
        }
    }

    pub fn hough_params(&self) -> HoughParams {
        HoughParams {
            threshold: self.hough_threshold,
            min_line_length: self.min_line_length_px,
            max_line_gap: self.max_line_gap_px,
            max_lines: self.max_lines,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let finite = [
            ("standard_angle_deg", self.standard_angle_deg),
            ("tolerance_deg", self.tolerance_deg),
            ("defect_min_deg", self.defect_min_deg),
            ("defect_max_deg", self.defect_max_deg),
            ("min_line_length_px", self.min_line_length_px),
            ("canny_low", self.canny_low),
            ("canny_high", self.canny_high),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(invalid(field, "must be finite"));
            }
        }
        if !(0.0..180.0).contains(&self.standard_angle_deg) {
            return Err(invalid("standard_angle_deg", "must lie in [0, 180)"));
        }
        if !(0.0..90.0).contains(&self.tolerance_deg) {
            return Err(invalid("tolerance_deg", "must lie in [0, 90)"));
        }
        for (field, value) in [
            ("defect_min_deg", self.defect_min_deg),
            ("defect_max_deg", self.defect_max_deg),
        ] {
            if !(0.0..=180.0).contains(&value) {
                return Err(invalid(field, "must lie in [0, 180]"));
            }
        }
        if self.defect_min_deg > self.defect_max_deg {
            return Err(invalid(
                "defect_min_deg",
                format!(
                    "({}) must not exceed defect_max_deg ({})",
                    self.defect_min_deg, self.defect_max_deg
                ),
            ));
        }
        if self.min_line_length_px <= 0.0 {
            return Err(invalid("min_line_length_px", "must be positive"));
        }
        if self.canny_low < 0.0 || self.canny_high <= 0.0 {
            return Err(invalid("canny_high", "thresholds must be positive"));
        }
        if self.canny_low > self.canny_high {
            return Err(invalid("canny_low", "must not exceed canny_high"));
        }
        if self.hough_threshold == 0 {
            return Err(invalid("hough_threshold", "must be at least 1"));
        }
        if self.max_lines == 0 {
            return Err(invalid("max_lines", "must be at least 1"));
        }
        if self.detection_interval_ms == 0 {
            return Err(invalid("detection_interval_ms", "must be at least 1 ms"));
        }
        Ok(())
    }

    /// Validate and return `self`, for builder-style construction.
    pub fn validated(self) -> Result<Self, SettingsError> {
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DetectionSettings::default().validate().is_ok());
        for profile in [
            PerformanceProfile::High,
            PerformanceProfile::Medium,
            PerformanceProfile::Low,
        ] {
            assert!(DetectionSettings::for_profile(profile).validate().is_ok());
        }
    }

    #[test]
    fn inverted_defect_band_is_rejected() {
        let settings = DetectionSettings {
            defect_min_deg: 110.0,
            defect_max_deg: 100.0,
            ..DetectionSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid {
                field: "defect_min_deg",
                ..
            })
        ));
    }

    #[test]
    fn out_of_range_and_non_finite_values_are_rejected() {
        let cases = [
            DetectionSettings {
                standard_angle_deg: 180.0,
                ..DetectionSettings::default()
            },
            DetectionSettings {
                tolerance_deg: -1.0,
                ..DetectionSettings::default()
            },
            DetectionSettings {
                canny_low: f32::NAN,
                ..DetectionSettings::default()
            },
            DetectionSettings {
                canny_low: 200.0,
                ..DetectionSettings::default()
            },
            DetectionSettings {
                detection_interval_ms: 0,
                ..DetectionSettings::default()
            },
            DetectionSettings {
                max_lines: 0,
                ..DetectionSettings::default()
            },
        ];
        for settings in cases {
            assert!(settings.validate().is_err(), "{settings:?}");
        }
    }

    #[test]
    fn profiles_set_cadence_and_hough_knobs() {
        let low = DetectionSettings::for_profile(PerformanceProfile::Low);
        assert_eq!(low.interval(), Duration::from_secs(1));
        assert_eq!(low.hough_threshold, 100);
        assert_eq!(low.max_line_gap_px, 30);
        assert_eq!(low.standard_angle_deg, 90.0);
        assert_eq!(PerformanceProfile::High.max_defect_images(), 200);
    }

    #[test]
    fn hardware_picks_the_profile() {
        assert_eq!(PerformanceProfile::for_hardware(8, 16.0), PerformanceProfile::High);
        assert_eq!(PerformanceProfile::for_hardware(16, 8.0), PerformanceProfile::Medium);
        assert_eq!(PerformanceProfile::for_hardware(4, 8.0), PerformanceProfile::Medium);
        assert_eq!(PerformanceProfile::for_hardware(2, 32.0), PerformanceProfile::Low);
        assert_eq!(PerformanceProfile::Low.camera_fps(), 15);
    }

    #[test]
    fn mem_total_is_read_from_meminfo() {
        let meminfo = "MemTotal:       16318480 kB\nMemFree:         1021404 kB\n";
        assert_eq!(parse_mem_total_kb(meminfo), Some(16_318_480));
        assert_eq!(parse_mem_total_kb("MemFree: 12 kB\n"), None);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: DetectionSettings =
            serde_json::from_str(r#"{"standard_angle_deg": 45.0, "gap_policy": "aligned"}"#)
                .unwrap();
        assert_eq!(settings.standard_angle_deg, 45.0);
        assert_eq!(settings.gap_policy, GapPolicy::Aligned);
        assert_eq!(settings.tolerance_deg, 5.0);
    }
}
