use std::path::PathBuf;

/// Typed failures that callers need to tell apart.
///
/// Everything else travels as a plain `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// Disk usage could not be read. Fatal to a pressure run.
    #[error("disk usage probe failed for {}: {source}", path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
    /// A remote call was rejected. Non-fatal per candidate.
    #[error("remote {action} failed: {detail}")]
    Remote { action: &'static str, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_is_downcastable() {
        let err: anyhow::Error = SweepError::Probe {
            path: PathBuf::from("/srv/media"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        }
        .into();
        let typed = err.downcast_ref::<SweepError>().unwrap();
        assert!(matches!(typed, SweepError::Probe { .. }));
        assert!(err.to_string().contains("/srv/media"));
    }

    #[test]
    fn remote_error_message() {
        let e = SweepError::Remote {
            action: "redact",
            detail: "403".into(),
        };
        assert_eq!(e.to_string(), "remote redact failed: 403");
    }
}
