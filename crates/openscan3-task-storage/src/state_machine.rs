//! Task state machine enforcement.
//!
//! Validates transitions per §3.7 / §4.5 of the task lifecycle:
//!
//! ```text
//! Pending -> Running | Cancelled
//! Running -> Paused | Completed | Cancelled | Error
//! Paused  -> Running | Cancelled
//! Completed/Cancelled/Error/Interrupted -> (terminal, no further transitions)
//! ```
//!
//! `Interrupted` and the `restart` reset back to `Pending` are applied
//! directly by the scheduler (boot recovery, restart) rather than through
//! this validator — both are administrative overrides, not task-driven
//! transitions.

use openscan3_core::TaskStatus;

use crate::error::TaskStorageError;

pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), TaskStorageError> {
    use TaskStatus::*;

    let ok = match from {
        Pending => matches!(to, Running | Cancelled),
        Running => matches!(to, Paused | Completed | Cancelled | Error),
        Paused => matches!(to, Running | Cancelled),
        Completed | Cancelled | Error | Interrupted => false,
    };

    if ok {
        Ok(())
    } else if is_terminal(from) {
        Err(TaskStorageError::TerminalState(from))
    } else {
        Err(TaskStorageError::InvalidTransition {
            current: from,
            requested: to,
        })
    }
}

pub fn is_terminal(status: TaskStatus) -> bool {
    status.is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    #[test]
    fn pending_can_start_or_be_cancelled() {
        assert!(validate_transition(Pending, Running).is_ok());
        assert!(validate_transition(Pending, Cancelled).is_ok());
        assert!(validate_transition(Pending, Paused).is_err());
    }

    #[test]
    fn running_can_reach_any_terminal_or_pause() {
        assert!(validate_transition(Running, Paused).is_ok());
        assert!(validate_transition(Running, Completed).is_ok());
        assert!(validate_transition(Running, Cancelled).is_ok());
        assert!(validate_transition(Running, Error).is_ok());
        assert!(validate_transition(Running, Pending).is_err());
    }

    #[test]
    fn paused_resumes_or_cancels() {
        assert!(validate_transition(Paused, Running).is_ok());
        assert!(validate_transition(Paused, Cancelled).is_ok());
        assert!(validate_transition(Paused, Completed).is_err());
    }

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [Completed, Cancelled, Error, Interrupted] {
            for target in [Pending, Running, Paused, Completed, Cancelled, Error, Interrupted] {
                let result = validate_transition(terminal, target);
                assert!(result.is_err(), "{:?} -> {:?} should be rejected", terminal, target);
                match result.unwrap_err() {
                    TaskStorageError::TerminalState(s) => assert_eq!(s, terminal),
                    other => panic!("expected TerminalState, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn is_terminal_matches_core() {
        assert!(is_terminal(Completed));
        assert!(is_terminal(Cancelled));
        assert!(is_terminal(Error));
        assert!(is_terminal(Interrupted));
        assert!(!is_terminal(Pending));
        assert!(!is_terminal(Running));
        assert!(!is_terminal(Paused));
    }
}
