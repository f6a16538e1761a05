use std::time::Duration;

/// Bounded exponential backoff for profile visibility retries. The schedule
/// doubles from `base` up to `cap` and stops after `attempts` retries; there
/// is no unbounded polling anywhere in session resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
    pub attempts: u32,
}

impl Backoff {
    pub const fn new(base: Duration, cap: Duration, attempts: u32) -> Self {
        Self { base, cap, attempts }
    }

    /// No retries at all: the first read is the only read.
    pub const fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 0)
    }

    /// The delay before each retry, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.attempts).map(|i| {
            let factor = 1u32.checked_shl(i).unwrap_or(u32::MAX);
            self.base
                .checked_mul(factor)
                .map(|d| d.min(self.cap))
                .unwrap_or(self.cap)
        })
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_millis(800), 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_doubles_from_base() {
        let delays: Vec<_> = Backoff::default().delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }

    #[test]
    fn schedule_is_capped_and_bounded() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(250), 6);
        let delays: Vec<_> = backoff.delays().collect();
        assert_eq!(delays.len(), 6);
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert!(delays[2..].iter().all(|d| *d == Duration::from_millis(250)));
    }

    #[test]
    fn disabled_backoff_never_retries() {
        assert_eq!(Backoff::disabled().delays().count(), 0);
    }
}
