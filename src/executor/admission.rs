//! Admission and running counters with RAII release

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub(super) struct AdmissionLimiter {
    limit: usize,
    admitted: AtomicUsize,
    running: AtomicUsize,
}

impl AdmissionLimiter {
    pub(super) fn new(limit: usize) -> Self {
        Self {
            limit,
            admitted: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
        }
    }

    pub(super) fn limit(&self) -> usize {
        self.limit
    }

    pub(super) fn admitted(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    pub(super) fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Claim a slot unless `limit` slots are already held
    pub(super) fn try_admit(this: &Arc<Self>) -> Option<AdmissionGuard> {
        let mut current = this.admitted.load(Ordering::Acquire);
        loop {
            if current >= this.limit {
                return None;
            }
            match this.admitted.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(AdmissionGuard {
                        limiter: Arc::clone(this),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// Holds one admission slot until dropped
#[derive(Debug)]
pub(super) struct AdmissionGuard {
    limiter: Arc<AdmissionLimiter>,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.limiter.admitted.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Marks one extraction as running until dropped
#[derive(Debug)]
pub(super) struct RunningGuard {
    limiter: Arc<AdmissionLimiter>,
}

impl RunningGuard {
    pub(super) fn enter(limiter: &Arc<AdmissionLimiter>) -> Self {
        limiter.running.fetch_add(1, Ordering::AcqRel);
        Self {
            limiter: Arc::clone(limiter),
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.limiter.running.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_enforced_and_released() {
        let limiter = Arc::new(AdmissionLimiter::new(2));
        let a = AdmissionLimiter::try_admit(&limiter).unwrap();
        let _b = AdmissionLimiter::try_admit(&limiter).unwrap();
        assert!(AdmissionLimiter::try_admit(&limiter).is_none());

        drop(a);
        assert_eq!(limiter.admitted(), 1);
        assert!(AdmissionLimiter::try_admit(&limiter).is_some());
    }

    #[test]
    fn test_running_guard() {
        let limiter = Arc::new(AdmissionLimiter::new(1));
        {
            let _running = RunningGuard::enter(&limiter);
            assert_eq!(limiter.running(), 1);
        }
        assert_eq!(limiter.running(), 0);
    }
}
