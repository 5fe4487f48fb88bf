use std::time::Duration;

/// What to do before a given attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Go straight ahead
    Immediate,

    /// Sleep first
    Backoff(Duration),

    /// Ask the overlay for a fresh identity first
    RotateIdentity,
}

/// Retry budget and escalation ladder for one fetch
///
/// | Attempt | Anonymous       | Direct  |
/// |---------|-----------------|---------|
/// | 1       | immediate       | immediate |
/// | 2       | backoff         | backoff |
/// | 3+      | rotate identity | backoff |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Escalation to apply before `attempt` (1-based)
    pub fn escalation(&self, attempt: u32, anonymous: bool) -> Escalation {
        match attempt {
            0 | 1 => Escalation::Immediate,
            2 => Escalation::Backoff(self.backoff),
            _ if anonymous => Escalation::RotateIdentity,
            _ => Escalation::Backoff(self.backoff),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_ladder() {
        let policy = RetryPolicy::new(4, Duration::from_millis(500));
        assert_eq!(policy.escalation(1, true), Escalation::Immediate);
        assert_eq!(
            policy.escalation(2, true),
            Escalation::Backoff(Duration::from_millis(500))
        );
        assert_eq!(policy.escalation(3, true), Escalation::RotateIdentity);
        assert_eq!(policy.escalation(4, true), Escalation::RotateIdentity);
    }

    #[test]
    fn test_direct_ladder_never_rotates() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        for attempt in 2..=5 {
            assert_eq!(
                policy.escalation(attempt, false),
                Escalation::Backoff(Duration::from_millis(10))
            );
        }
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
