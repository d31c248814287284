//! Transaction-interrupt state
//!
//! A backend failure inside an open transaction poisons the session: every
//! later statement fast-fails with the stored reason until an explicit
//! rollback. Flag and message are one atomically-swapped value so a reader
//! can never observe "interrupted" with a stale or empty message.

use std::sync::RwLock;

use crate::constants::limits;

/// Interrupt flag plus reason, swapped as a single value
#[derive(Debug, Default)]
pub struct TxInterrupt {
    state: RwLock<Option<String>>,
}

impl TxInterrupt {
    /// Create in the not-interrupted state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the transaction interrupted with the given reason
    ///
    /// The first interrupt wins; later failures inside the same poisoned
    /// transaction keep the original reason. Overlong reasons are truncated.
    pub fn interrupt(&self, reason: impl Into<String>) {
        let mut reason = reason.into();
        if reason.len() > limits::MAX_INTERRUPT_REASON {
            let cut = (0..=limits::MAX_INTERRUPT_REASON)
                .rev()
                .find(|&i| reason.is_char_boundary(i))
                .unwrap_or(0);
            reason.truncate(cut);
        }

        let mut state = self.state.write().expect("interrupt state poisoned");
        if state.is_none() {
            *state = Some(reason);
        }
    }

    /// Clear the interrupt (rollback only)
    pub fn clear(&self) {
        *self.state.write().expect("interrupt state poisoned") = None;
    }

    /// The stored reason, if interrupted
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state
            .read()
            .expect("interrupt state poisoned")
            .clone()
    }

    /// Whether the transaction is interrupted
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.state
            .read()
            .expect("interrupt state poisoned")
            .is_some()
    }
}
