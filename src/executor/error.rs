//! Process execution errors

use std::io;
use thiserror::Error;

/// Errors raised while starting or reaping a child process
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid environment specifier: '{0}'")]
    InvalidEnv(String),
}

impl ExecError {
    /// True when the executable could not be found
    pub fn is_not_found(&self) -> bool {
        match self {
            ExecError::Spawn { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = ExecError::Spawn {
            program: "missing".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "failed to start 'missing': No such file or directory"
        );

        let err = ExecError::Spawn {
            program: "locked".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.is_not_found());
    }
}
