use mediasweep_core::SweepError;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Capacity of the volume holding the media root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskUsage {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    /// Used fraction in `[0, 1]`. An empty volume reports zero.
    pub fn used_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64
    }
}

/// Source of live disk utilization readings.
pub trait DiskProbe {
    fn usage(&self) -> Result<DiskUsage, SweepError>;
}

/// Reads the filesystem holding `root` through `statvfs`.
pub struct VolumeProbe {
    root: PathBuf,
}

impl VolumeProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DiskProbe for VolumeProbe {
    fn usage(&self) -> Result<DiskUsage, SweepError> {
        let probe_err = |source| SweepError::Probe {
            path: self.root.clone(),
            source,
        };
        let total_bytes = fs2::total_space(&self.root).map_err(probe_err)?;
        let available_bytes = fs2::available_space(&self.root).map_err(probe_err)?;
        Ok(DiskUsage {
            total_bytes,
            available_bytes,
        })
    }
}

/// Probe that replays a fixed sequence of readings, repeating the last one.
/// An empty script fails every call.
pub struct ScriptedProbe {
    readings: RefCell<VecDeque<DiskUsage>>,
    calls: RefCell<usize>,
}

impl ScriptedProbe {
    pub fn new(readings: Vec<DiskUsage>) -> Self {
        Self {
            readings: RefCell::new(readings.into()),
            calls: RefCell::new(0),
        }
    }

    /// Readings expressed as used fractions of a 1000-byte volume.
    pub fn from_fractions(fractions: &[f64]) -> Self {
        Self::new(
            fractions
                .iter()
                .map(|f| DiskUsage {
                    total_bytes: 1000,
                    available_bytes: 1000 - (f * 1000.0).round() as u64,
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl DiskProbe for ScriptedProbe {
    fn usage(&self) -> Result<DiskUsage, SweepError> {
        *self.calls.borrow_mut() += 1;
        let mut readings = self.readings.borrow_mut();
        let reading = if readings.len() > 1 {
            readings.pop_front()
        } else {
            readings.front().copied()
        };
        reading.ok_or_else(|| SweepError::Probe {
            path: PathBuf::from("<scripted>"),
            source: std::io::Error::other("no reading scripted"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_fraction_from_capacity() {
        let u = DiskUsage {
            total_bytes: 200,
            available_bytes: 50,
        };
        assert_eq!(u.used_bytes(), 150);
        assert!((u.used_fraction() - 0.75).abs() < 1e-9);
        let empty = DiskUsage {
            total_bytes: 0,
            available_bytes: 0,
        };
        assert_eq!(empty.used_fraction(), 0.0);
    }

    #[test]
    fn volume_probe_reads_temp_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let usage = VolumeProbe::new(tmp.path()).usage().unwrap();
        assert!(usage.total_bytes > 0);
        assert!((0.0..=1.0).contains(&usage.used_fraction()));
    }

    #[test]
    fn volume_probe_missing_path_is_probe_error() {
        let err = VolumeProbe::new("/nonexistent/mediasweep/volume")
            .usage()
            .unwrap_err();
        assert!(matches!(err, SweepError::Probe { .. }));
    }

    #[test]
    fn scripted_probe_repeats_last_reading() {
        let p = ScriptedProbe::from_fractions(&[0.9, 0.8]);
        assert!((p.usage().unwrap().used_fraction() - 0.9).abs() < 1e-9);
        assert!((p.usage().unwrap().used_fraction() - 0.8).abs() < 1e-9);
        assert!((p.usage().unwrap().used_fraction() - 0.8).abs() < 1e-9);
        assert_eq!(p.calls(), 3);
        assert!(ScriptedProbe::new(Vec::new()).usage().is_err());
    }
}
