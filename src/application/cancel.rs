use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::error::DiffError;

/// Cloneable flag checked between per-table units of work.
///
/// Cancelling never interrupts a statement already running against SQLite;
/// the next `checkpoint()` returns [`DiffError::Cancelled`] instead.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn checkpoint(&self) -> Result<(), DiffError> {
        if self.is_cancelled() {
            return Err(DiffError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(clone.checkpoint().is_ok());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.checkpoint(), Err(DiffError::Cancelled)));
    }
}
