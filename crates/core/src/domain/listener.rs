// Listener lifecycle state machine

use crate::domain::error::{DomainError, Result};

/// Listener lifecycle of a queue facade.
///
/// `Unregistered -> Registered -> Listening`; `Listening` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    #[default]
    Unregistered,
    Registered,
    Listening,
}

impl std::fmt::Display for ListenerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerState::Unregistered => write!(f, "UNREGISTERED"),
            ListenerState::Registered => write!(f, "REGISTERED"),
            ListenerState::Listening => write!(f, "LISTENING"),
        }
    }
}

impl ListenerState {
    /// Register (or replace) handlers; allowed until the listener starts
    pub fn register(&mut self) -> Result<()> {
        if *self == ListenerState::Listening {
            return Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: "REGISTERED".to_string(),
            });
        }
        *self = ListenerState::Registered;
        Ok(())
    }

    /// Start listening; only valid once, from `Registered`
    pub fn start(&mut self) -> Result<()> {
        if *self != ListenerState::Registered {
            return Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: "LISTENING".to_string(),
            });
        }
        *self = ListenerState::Listening;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = ListenerState::default();
        state.register().unwrap();
        state.register().unwrap(); // re-registration before start
        state.start().unwrap();
        assert_eq!(state, ListenerState::Listening);
    }

    #[test]
    fn test_start_requires_registration() {
        let mut state = ListenerState::Unregistered;
        assert!(state.start().is_err());
        assert_eq!(state, ListenerState::Unregistered);
    }

    #[test]
    fn test_listening_is_terminal() {
        let mut state = ListenerState::Registered;
        state.start().unwrap();
        assert!(state.start().is_err());
        assert!(state.register().is_err());
        assert_eq!(state, ListenerState::Listening);
    }
}
