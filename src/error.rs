use thiserror::Error;

/// Failure taxonomy for resolving a target and typing into it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypingError {
    #[error("no editable target found")]
    NoTargetFound,
    #[error("inserting {ch:?} failed: {reason}")]
    InsertionFailed { ch: char, reason: String },
    #[error("target was removed from the document")]
    TargetDetached,
    /// The user stopped the session.
    #[error("typing cancelled")]
    Cancelled,
    /// A newer session replaced this one.
    #[error("typing superseded by a newer session")]
    Aborted,
    #[error("could not start typing worker: {0}")]
    WorkerUnavailable(String),
}

impl TypingError {
    /// A user stop and a replacement are clean terminal states.
    pub fn is_failure(&self) -> bool {
        !matches!(self, TypingError::Cancelled | TypingError::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_not_a_failure() {
        assert!(!TypingError::Cancelled.is_failure());
        assert!(!TypingError::Aborted.is_failure());
        assert!(TypingError::TargetDetached.is_failure());
        assert!(TypingError::NoTargetFound.is_failure());
    }

    #[test]
    fn insertion_failure_names_the_character() {
        let err = TypingError::InsertionFailed {
            ch: 'x',
            reason: "no selection".into(),
        };
        assert_eq!(err.to_string(), "inserting 'x' failed: no selection");
    }
}
