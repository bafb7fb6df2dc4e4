//! Cancellation and per-document deadlines

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Caller-supplied cancellation signal, cheap to clone and share across workers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why staging has to stop early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

/// Everything the applier checks between staged operations
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl StopSignal {
    /// A timeout too large to represent as an instant means no deadline
    pub fn new(cancel: CancelToken, timeout: Option<Duration>) -> Self {
        StopSignal {
            cancel,
            deadline: timeout.and_then(|timeout| Instant::now().checked_add(timeout)),
        }
    }

    pub fn check(&self) -> Option<Interrupt> {
        if self.cancel.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::DeadlineExceeded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared() {
        let token = CancelToken::new();
        let signal = StopSignal::new(token.clone(), None);
        assert_eq!(signal.check(), None);

        token.cancel();
        assert_eq!(signal.check(), Some(Interrupt::Cancelled));
    }

    #[test]
    fn test_zero_timeout_is_already_exceeded() {
        let signal = StopSignal::new(CancelToken::new(), Some(Duration::ZERO));
        assert_eq!(signal.check(), Some(Interrupt::DeadlineExceeded));
    }

    #[test]
    fn test_unrepresentable_timeout_never_expires() {
        let signal = StopSignal::new(
            CancelToken::new(),
            Some(Duration::from_secs(i64::MAX as u64)),
        );
        assert_eq!(signal.check(), None);
        assert_eq!(signal.deadline, None);
    }
}
