//! Polling of the flash controller ready flag.

use std::time::Duration;

/// How often and how long to poll the ready flag before giving up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReadyPolicy {
    /// Number of polls before the wait is considered timed out. Must be at least 1.
    pub max_attempts: u32,
    /// Delay after every poll which did not see the flag.
    pub poll_interval: Duration,
}

impl ReadyPolicy {
    /// Creates a policy polling up to `max_attempts` times, `poll_interval` apart.
    pub fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            max_attempts,
            poll_interval,
        }
    }

    /// The longest time a single wait can take, saturating at [`Duration::MAX`].
    pub fn max_wait(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_attempts)
    }
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Something that can suspend execution between two polls.
pub trait Delay {
    /// Block for `duration`.
    fn delay(&mut self, duration: Duration);
}

/// Blocks the calling thread with [`std::thread::sleep`].
#[derive(Debug, Default, Copy, Clone)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// The ready flag was not observed.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum ReadyError {
    /// The ready flag was not set after {attempts} polls.
    Timeout {
        /// Number of polls performed.
        attempts: u32,
    },
    /// Reading the ready flag failed.
    Memory(#[from] crate::Error),
}

/// Polls `is_ready` until it reports `true`, at most `policy.max_attempts` times.
///
/// Returns the 1-based number of the poll which saw the flag. Every poll that
/// did not see the flag is followed by a delay of `policy.poll_interval`, so a
/// timeout takes `policy.max_wait()` in total. An error while polling ends the
/// wait immediately.
pub fn wait_ready(
    mut is_ready: impl FnMut() -> Result<bool, crate::Error>,
    policy: &ReadyPolicy,
    delay: &mut dyn Delay,
) -> Result<u32, ReadyError> {
    for attempt in 1..=policy.max_attempts {
        if is_ready()? {
            return Ok(attempt);
        }
        delay.delay(policy.poll_interval);
    }

    Err(ReadyError::Timeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[derive(Default)]
    struct CountingDelay {
        calls: u32,
        total: Duration,
    }

    impl Delay for CountingDelay {
        fn delay(&mut self, duration: Duration) {
            self.calls += 1;
            self.total += duration;
        }
    }

    fn ready_after(polls_until_ready: u32) -> impl FnMut() -> Result<bool, crate::Error> {
        let mut polls = 0;
        move || {
            polls += 1;
            Ok(polls > polls_until_ready)
        }
    }

    #[test]
    fn ready_immediately() {
        let mut delay = CountingDelay::default();

        let attempt = wait_ready(|| Ok(true), &ReadyPolicy::default(), &mut delay).unwrap();

        assert_eq!(attempt, 1);
        assert_eq!(delay.calls, 0);
    }

    #[test_case(1, 0; "single attempt, ready at once")]
    #[test_case(5, 4; "ready on the last attempt")]
    #[test_case(10, 3; "ready early")]
    fn ready_within_budget(max_attempts: u32, polls_until_ready: u32) {
        let policy = ReadyPolicy::new(max_attempts, Duration::from_millis(100));
        let mut delay = CountingDelay::default();

        let attempt = wait_ready(ready_after(polls_until_ready), &policy, &mut delay).unwrap();

        assert_eq!(attempt, polls_until_ready + 1);
        assert_eq!(delay.calls, polls_until_ready);
    }

    #[test_case(1; "single attempt")]
    #[test_case(5; "default budget")]
    #[test_case(32; "large budget")]
    fn never_ready_times_out(max_attempts: u32) {
        let policy = ReadyPolicy::new(max_attempts, Duration::from_millis(10));
        let mut delay = CountingDelay::default();

        let result = wait_ready(|| Ok(false), &policy, &mut delay);

        assert!(
            matches!(result, Err(ReadyError::Timeout { attempts }) if attempts == max_attempts)
        );
        assert_eq!(delay.calls, max_attempts);
        assert_eq!(delay.total, policy.max_wait());
    }

    #[test]
    fn ready_one_poll_too_late() {
        let policy = ReadyPolicy::new(3, Duration::from_millis(1));
        let mut delay = CountingDelay::default();

        let result = wait_ready(ready_after(3), &policy, &mut delay);

        assert!(matches!(result, Err(ReadyError::Timeout { attempts: 3 })));
    }

    #[test]
    fn poll_error_aborts_wait() {
        let mut delay = CountingDelay::default();
        let mut polls = 0;

        let result = wait_ready(
            || {
                polls += 1;
                Err(crate::Error::UnmappedAddress(0x4001_e400))
            },
            &ReadyPolicy::default(),
            &mut delay,
        );

        assert!(matches!(
            result,
            Err(ReadyError::Memory(crate::Error::UnmappedAddress(0x4001_e400)))
        ));
        assert_eq!(polls, 1);
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn huge_policy_saturates() {
        let policy = ReadyPolicy::new(u32::MAX, Duration::MAX / 2);

        assert_eq!(policy.max_wait(), Duration::MAX);
    }

    #[test]
    fn default_policy() {
        let policy = ReadyPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.max_wait(), Duration::from_millis(500));
    }
}
