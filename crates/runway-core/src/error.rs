//! Error taxonomy shared by every runway operation.
//!
//! Validation and state-conflict errors are rejected before any mutation is
//! applied. Integrity errors describe an invariant found false during a
//! consistency sweep; they are surfaced, never repaired.

use thiserror::Error;

/// Broad class of a [`CoreError`], used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateConflict,
    NotFound,
    Integrity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("aircraft {aircraft_id} already holds runway {runway_id}")]
    DuplicateAssignment {
        aircraft_id: String,
        runway_id: String,
    },

    #[error("runway {runway_id} is not occupied (status {status})")]
    RunwayNotOccupied { runway_id: String, status: String },

    #[error("critical threshold {critical} must be below low threshold {low}")]
    ThresholdMisconfigured { critical: u8, low: u8 },

    #[error("alert {alert_id} has already ended")]
    AlertEnded { alert_id: String },

    #[error("aircraft {aircraft_id} has already landed")]
    AlreadyLanded { aircraft_id: String },

    #[error("aircraft {aircraft_id} does not hold runway {runway_id} under claim {claim}")]
    NotAssigned {
        aircraft_id: String,
        runway_id: String,
        claim: u64,
    },

    #[error("aircraft {aircraft_id} is past touchdown on {runway_id}")]
    PastTouchdown {
        aircraft_id: String,
        runway_id: String,
    },

    #[error("runway {runway_id} is {actual}, expected {expected}")]
    UnexpectedRunwayStatus {
        runway_id: String,
        expected: String,
        actual: String,
    },

    #[error("{entity} is quarantined: {reason}")]
    Quarantined { entity: String, reason: String },

    #[error("integrity violation on {entity}: {reason}")]
    Integrity { entity: String, reason: String },
}

impl CoreError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::DuplicateAssignment { .. }
            | Self::RunwayNotOccupied { .. }
            | Self::ThresholdMisconfigured { .. }
            | Self::AlertEnded { .. }
            | Self::AlreadyLanded { .. }
            | Self::NotAssigned { .. }
            | Self::PastTouchdown { .. }
            | Self::UnexpectedRunwayStatus { .. }
            | Self::Quarantined { .. } => ErrorKind::StateConflict,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            CoreError::validation("fuelLevel", "out of range").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            CoreError::ThresholdMisconfigured { critical: 20, low: 10 }.kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(
            CoreError::not_found("runway", "RW09").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn messages_name_the_entities() {
        let err = CoreError::DuplicateAssignment {
            aircraft_id: "AC001".into(),
            runway_id: "RW01".into(),
        };
        assert_eq!(err.to_string(), "aircraft AC001 already holds runway RW01");
    }
}
