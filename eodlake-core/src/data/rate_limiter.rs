//! Fixed-delay rate limiter shared by every request a client issues.
//!
//! Each permit is granted no sooner than `min_interval` after the previous
//! one. The mutex is held across the wait, so concurrent callers queue up
//! behind it and the aggregate request rate does not grow with worker count.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_permit: Mutex::new(None),
        }
    }

    /// Limiter for a provider ceiling of `requests` per minute.
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        Self::new(Duration::from_secs(60) / requests)
    }

    /// No delay between permits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until a request may be sent, then record it.
    ///
    /// Returns how long the caller waited.
    pub fn acquire(&self) -> Duration {
        // A poisoned lock only means another worker panicked mid-wait; the
        // timestamp inside is still valid.
        let mut last = self
            .last_permit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let waited = match *last {
            Some(prev) => {
                let elapsed = prev.elapsed();
                if elapsed < self.min_interval {
                    let wait = self.min_interval - elapsed;
                    std::thread::sleep(wait);
                    wait
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };

        *last = Some(Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_permit_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        assert_eq!(limiter.acquire(), Duration::ZERO);
    }

    #[test]
    fn per_minute_interval() {
        assert_eq!(
            RateLimiter::per_minute(1000).min_interval(),
            Duration::from_millis(60)
        );
        assert_eq!(
            RateLimiter::per_minute(0).min_interval(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn sequential_permits_respect_lower_bound() {
        let delay = Duration::from_millis(20);
        let limiter = RateLimiter::new(delay);
        let m = 5;

        let start = Instant::now();
        for _ in 0..m {
            limiter.acquire();
        }
        assert!(start.elapsed() >= delay * (m - 1));
    }

    #[test]
    fn shared_limiter_spaces_concurrent_workers() {
        let delay = Duration::from_millis(15);
        let limiter = Arc::new(RateLimiter::new(delay));
        let workers = 4;
        let per_worker = 2;

        let start = Instant::now();
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    for _ in 0..per_worker {
                        limiter.acquire();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let total = (workers * per_worker) as u32;
        assert!(start.elapsed() >= delay * (total - 1));
    }
}
