use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on capture rate; `None` follows the source.
    pub max_frame_rate: Option<f64>,
    /// Consecutive source timeouts before the source is reopened.
    pub max_consecutive_failures: u32,
    /// Pause before reopening a stalled source.
    pub reconnect_delay_ms: u64,
    /// Capacity of the presentation event channel.
    pub event_capacity: usize,
    /// Attach the defect frame to events.
    pub capture_defect_frames: bool,
    /// Frame attachments per second; `None` uses the performance profile.
    pub max_captures_per_second: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_frame_rate: None,
            max_consecutive_failures: 3,
            reconnect_delay_ms: 2000,
            event_capacity: 16,
            capture_defect_frames: true,
            max_captures_per_second: None,
        }
    }
}

impl PipelineConfig {
    pub fn min_frame_period(&self) -> Option<Duration> {
        self.max_frame_rate
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f64(1.0 / fps))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(fps) = self.max_frame_rate {
            if !fps.is_finite() || fps <= 0.0 {
                return Err("max_frame_rate must be positive".to_string());
            }
        }
        if self.max_consecutive_failures == 0 {
            return Err("max_consecutive_failures must be at least 1".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}
