use crate::clock::DAY_MS;
use crate::error::SweepError;
use serde::{Deserialize, Serialize};

/// Mime prefix that marks an upload as an image.
pub const IMAGE_MIME_PREFIX: &str = "image/";

/// Prefix of the reason string attached to remote redactions.
pub const REDACTION_REASON_PREFIX: &str = "mediasweep cleanup";

/// One observed media upload (one row in the `uploads` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub event_id: String,
    pub room_id: String,
    pub sender_id: String,
    /// Opaque remote locator, `mxc://authority/id`.
    pub media_ref: String,
    #[serde(default)]
    pub mime_type: String,
    pub size_bytes: u64,
    /// Milliseconds since the Unix epoch.
    pub observed_at: i64,
}

impl UploadRecord {
    pub fn class(&self) -> MediaClass {
        MediaClass::from_mime(&self.mime_type)
    }
}

/// Media class used for ordering and tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaClass {
    Image,
    NonImage,
}

impl MediaClass {
    /// `image/*` is an image; everything else, including an empty mime type, is not.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with(IMAGE_MIME_PREFIX) {
            MediaClass::Image
        } else {
            MediaClass::NonImage
        }
    }
}

impl std::fmt::Display for MediaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaClass::Image => write!(f, "image"),
            MediaClass::NonImage => write!(f, "non_image"),
        }
    }
}

/// Which eviction policy a run applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Fixed-age retention, independent of disk state.
    Retention,
    /// Live disk-pressure eviction.
    Pressure,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Retention => write!(f, "retention"),
            RunMode::Pressure => write!(f, "pressure"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retention" => Ok(RunMode::Retention),
            "pressure" => Ok(RunMode::Pressure),
            _ => anyhow::bail!("invalid run mode: {s}. Expected: retention, pressure"),
        }
    }
}

/// Why a candidate was evicted. Sent to the remote side with the redaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictReason {
    Retention,
    Pressure,
    /// Pressure run with live utilization at or above the emergency threshold.
    Emergency,
}

impl EvictReason {
    /// Human-readable reason attached to the redaction request.
    pub fn redaction_text(self) -> String {
        format!("{REDACTION_REASON_PREFIX}: {self}")
    }
}

impl std::fmt::Display for EvictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictReason::Retention => write!(f, "retention"),
            EvictReason::Pressure => write!(f, "pressure"),
            EvictReason::Emergency => write!(f, "emergency"),
        }
    }
}

/// Eviction policy. Configuration only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub image_retention_days: u32,
    pub non_image_retention_days: u32,
    /// Used fraction of the volume at which pressure eviction starts.
    pub pressure_threshold: f64,
    /// Used fraction at which pressure evictions are tagged as emergency.
    pub emergency_threshold: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            image_retention_days: 90,
            non_image_retention_days: 30,
            pressure_threshold: 0.85,
            emergency_threshold: 0.92,
        }
    }
}

impl Policy {
    /// Thresholds must lie in `[0, 1]` with `emergency >= pressure`.
    pub fn validate(&self) -> Result<(), SweepError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.pressure_threshold) {
            return Err(SweepError::InvalidPolicy(format!(
                "pressure threshold {} is outside [0, 1]",
                self.pressure_threshold
            )));
        }
        if !in_unit(self.emergency_threshold) {
            return Err(SweepError::InvalidPolicy(format!(
                "emergency threshold {} is outside [0, 1]",
                self.emergency_threshold
            )));
        }
        if self.emergency_threshold < self.pressure_threshold {
            return Err(SweepError::InvalidPolicy(format!(
                "emergency threshold {} is below pressure threshold {}",
                self.emergency_threshold, self.pressure_threshold
            )));
        }
        Ok(())
    }

    /// Records observed strictly before this instant are retention candidates.
    pub fn cutoff_ms(&self, class: MediaClass, now_ms: i64) -> i64 {
        let days = match class {
            MediaClass::Image => self.image_retention_days,
            MediaClass::NonImage => self.non_image_retention_days,
        };
        now_ms.saturating_sub(i64::from(days).saturating_mul(DAY_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_from_mime_prefix() {
        assert_eq!(MediaClass::from_mime("image/png"), MediaClass::Image);
        assert_eq!(MediaClass::from_mime("image/"), MediaClass::Image);
        assert_eq!(MediaClass::from_mime("video/mp4"), MediaClass::NonImage);
        assert_eq!(MediaClass::from_mime(""), MediaClass::NonImage);
        assert_eq!(MediaClass::from_mime("Image/PNG"), MediaClass::NonImage);
    }

    #[test]
    fn policy_defaults() {
        let p = Policy::default();
        assert_eq!(p.image_retention_days, 90);
        assert_eq!(p.non_image_retention_days, 30);
        assert_eq!(p.pressure_threshold, 0.85);
        assert_eq!(p.emergency_threshold, 0.92);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn policy_rejects_inverted_thresholds() {
        let p = Policy {
            pressure_threshold: 0.9,
            emergency_threshold: 0.8,
            ..Policy::default()
        };
        assert!(matches!(p.validate(), Err(SweepError::InvalidPolicy(_))));

        let p = Policy {
            pressure_threshold: 1.5,
            emergency_threshold: 1.5,
            ..Policy::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn cutoff_per_class() {
        let p = Policy::default();
        let now = 200 * DAY_MS;
        assert_eq!(p.cutoff_ms(MediaClass::Image, now), 110 * DAY_MS);
        assert_eq!(p.cutoff_ms(MediaClass::NonImage, now), 170 * DAY_MS);
    }

    #[test]
    fn reason_text() {
        assert_eq!(
            EvictReason::Emergency.redaction_text(),
            "mediasweep cleanup: emergency"
        );
        assert_eq!(EvictReason::Retention.to_string(), "retention");
    }

    #[test]
    fn run_mode_parse() {
        assert_eq!("pressure".parse::<RunMode>().unwrap(), RunMode::Pressure);
        assert!("weekly".parse::<RunMode>().is_err());
    }
}
