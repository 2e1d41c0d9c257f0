//! Error types for Switchboard

use thiserror::Error;

use crate::selection::filter::{EliminationBreakdown, FilterPredicate};

/// Result type alias using Switchboard's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Switchboard error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Selection errors (E001-E099)
    #[error(
        "No eligible worker: every candidate was removed by the '{reason}' check ({breakdown})"
    )]
    NoEligibleWorker {
        /// First predicate that left the candidate set empty
        reason: FilterPredicate,
        /// Number of workers removed by each predicate
        breakdown: EliminationBreakdown,
    },

    // Profile errors (E100-E199)
    #[error("Weight profile '{0}' not found. Run `switchboard profiles list` to see all profiles.")]
    ProfileNotFound(String),

    #[error("Invalid weight profile '{id}': {message}")]
    InvalidProfile { id: String, message: String },

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Serialization errors (E900-E999)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoEligibleWorker { .. } => "E001",
            Self::ProfileNotFound(_) => "E100",
            Self::InvalidProfile { .. } => "E101",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Json(_) => "E900",
            Self::Toml(_) => "E901",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NoEligibleWorker { reason, .. } => Some(reason.relaxation_hint().to_string()),
            Self::ProfileNotFound(_) => Some("switchboard profiles list".to_string()),
            Self::ConfigError(_) => Some("switchboard config list".to_string()),
            _ => None,
        }
    }

    /// Whether the caller can recover by changing its request
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NoEligibleWorker { .. } | Self::ProfileNotFound(_) | Self::InvalidInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::ProfileNotFound("x".into()).code(), "E100");
        assert_eq!(Error::ConfigError("bad".into()).code(), "E600");
        assert_eq!(
            Error::NoEligibleWorker {
                reason: FilterPredicate::Capability,
                breakdown: EliminationBreakdown::default(),
            }
            .code(),
            "E001"
        );
    }

    #[test]
    fn test_no_eligible_worker_suggestion() {
        let err = Error::NoEligibleWorker {
            reason: FilterPredicate::QualityFloor,
            breakdown: EliminationBreakdown::default(),
        };
        assert!(err.is_caller_error());
        assert!(err.suggestion().unwrap().contains("quality"));
        assert!(err.to_string().contains("quality_floor"));
    }

    #[test]
    fn test_profile_not_found_message() {
        let err = Error::ProfileNotFound("missing".to_string());
        assert!(err.to_string().contains("missing"));
        assert_eq!(err.suggestion().as_deref(), Some("switchboard profiles list"));
    }
}
