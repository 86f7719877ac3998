//! Engine error taxonomy.
//!
//! Every state-mutating command validates before committing; a returned error
//! means the mutation did not happen. External-call failures surface as
//! `TransientExternal` and never corrupt engine state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Unparseable or malformed input (bad spawn time, empty name, bad id).
    #[error("input error: {0}")]
    Input(String),

    /// An external collaborator (OCR engine, report sink) failed.
    #[error("external call failed: {0}")]
    TransientExternal(String),

    /// A transition that would break an engine invariant was rejected.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A superseded OCR result or publish commit arrived after a newer one.
    #[error("stale result: {0}")]
    Stale(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl EngineError {
    /// Stable machine-readable kind, used by the API error mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::TransientExternal(_) => "transient_external",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::Stale(_) => "stale",
            Self::NotFound(_) => "not_found",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(EngineError::Input("x".into()).kind(), "input");
        assert_eq!(
            EngineError::InvariantViolation("x".into()).kind(),
            "invariant_violation"
        );
        assert_eq!(EngineError::Stale("x".into()).kind(), "stale");
    }

    #[test]
    fn test_display_includes_message() {
        let err = EngineError::InvariantViolation("two active events".into());
        assert_eq!(err.to_string(), "invariant violation: two active events");
    }
}
