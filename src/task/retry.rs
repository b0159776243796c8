use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::ActionType;

/// Retry settings applied to one wrapped call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub retry_count: u32,
    /// Seconds to wait before the first retry
    pub retry_delay: f64,
    /// Growth of the delay after every retry: `delay *= 1 + backoff`
    pub retry_backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 0,
            retry_delay: 1.0,
            retry_backoff: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_count: u32, retry_delay: f64, retry_backoff: f64) -> Self {
        Self {
            retry_count,
            retry_delay,
            retry_backoff,
        }
    }

    /// Delays slept between attempts, in order. Non-positive delays are
    /// zero; delays past `Duration::MAX` saturate.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let growth = 1.0 + self.retry_backoff;
        std::iter::successors(Some(self.retry_delay), move |delay| Some(delay * growth))
            .take(self.retry_count as usize)
            .map(seconds_to_duration)
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

/// Callbacks a task exposes to [`retry`].
///
/// The skip checks default to "never skip".
pub trait TaskLifecycle {
    fn log_start(&self, action_type: ActionType);

    fn log_retry(&self, action_type: ActionType);

    fn log_end(&self, action_type: ActionType, fault: Option<&(dyn Error + 'static)>);

    fn skip_if_disabled(&self) -> bool {
        false
    }

    fn skip_if_action_disabled(&self, _action_type: ActionType) -> bool {
        false
    }
}

/// Run `task` with up to `policy.retry_count` retries.
///
/// When the lifecycle reports the task or the action as disabled,
/// `default_return` is returned without invoking `task` or any callback.
/// Otherwise `log_start` fires once, `log_retry` before every retry, and
/// `log_end` once with the final fault if all attempts failed. The final
/// fault is returned unchanged. Waits block the calling thread.
pub fn retry<L, T, E, F>(
    lifecycle: &L,
    policy: &RetryPolicy,
    action_type: ActionType,
    default_return: T,
    mut task: F,
) -> Result<T, E>
where
    L: TaskLifecycle + ?Sized,
    E: Error + 'static,
    F: FnMut() -> Result<T, E>,
{
    if lifecycle.skip_if_disabled() || lifecycle.skip_if_action_disabled(action_type) {
        debug!("Skipping disabled {} task", action_type);
        return Ok(default_return);
    }

    let mut delays = policy.delays();
    let mut attempt: u32 = 0;
    lifecycle.log_start(action_type);

    loop {
        attempt += 1;
        match task() {
            Ok(value) => {
                lifecycle.log_end(action_type, None);
                return Ok(value);
            }
            Err(fault) => match delays.next() {
                Some(delay) => {
                    warn!(
                        "{} attempt {} failed: {}; retrying in {:?}",
                        action_type, attempt, fault, delay
                    );
                    lifecycle.log_retry(action_type);
                    std::thread::sleep(delay);
                }
                None => {
                    error!(
                        "{} task failed after {} attempt(s): {}",
                        action_type, attempt, fault
                    );
                    lifecycle.log_end(action_type, Some(&fault));
                    return Err(fault);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("missing key: {0}")]
    struct KeyError(String);

    #[derive(Default)]
    struct RecordingTask {
        disabled: bool,
        disabled_action: Option<ActionType>,
        events: RefCell<Vec<String>>,
    }

    impl TaskLifecycle for RecordingTask {
        fn log_start(&self, action_type: ActionType) {
            self.events.borrow_mut().push(format!("start:{}", action_type));
        }

        fn log_retry(&self, action_type: ActionType) {
            self.events.borrow_mut().push(format!("retry:{}", action_type));
        }

        fn log_end(&self, action_type: ActionType, fault: Option<&(dyn Error + 'static)>) {
            let entry = match fault {
                Some(fault) => format!("end:{}:{}", action_type, fault),
                None => format!("end:{}", action_type),
            };
            self.events.borrow_mut().push(entry);
        }

        fn skip_if_disabled(&self) -> bool {
            self.disabled
        }

        fn skip_if_action_disabled(&self, action_type: ActionType) -> bool {
            self.disabled_action == Some(action_type)
        }
    }

    impl RecordingTask {
        fn count(&self, prefix: &str) -> usize {
            self.events
                .borrow()
                .iter()
                .filter(|e| e.starts_with(prefix))
                .count()
        }
    }

    #[test]
    fn test_retry_exhausts_and_propagates_fault() {
        let task = RecordingTask::default();
        let policy = RetryPolicy::new(5, 0.0, 0.0);
        let mut calls = 0;

        let result: Result<Vec<u8>, KeyError> =
            retry(&task, &policy, ActionType::Access, Vec::new(), || {
                calls += 1;
                Err(KeyError("email".to_string()))
            });

        assert_eq!(result, Err(KeyError("email".to_string())));
        assert_eq!(calls, 6);
        assert_eq!(task.count("start:"), 1);
        assert_eq!(task.count("retry:"), 5);
        assert_eq!(
            task.events.borrow().last().map(String::as_str),
            Some("end:access:missing key: email")
        );
    }

    #[test]
    fn test_retry_succeeds_after_failures() {
        let task = RecordingTask::default();
        let policy = RetryPolicy::new(3, 0.0, 1.0);
        let mut calls = 0;

        let result: Result<u32, KeyError> =
            retry(&task, &policy, ActionType::Erasure, 0, || {
                calls += 1;
                if calls < 3 {
                    Err(KeyError("id".to_string()))
                } else {
                    Ok(calls)
                }
            });

        assert_eq!(result, Ok(3));
        assert_eq!(
            *task.events.borrow(),
            vec!["start:erasure", "retry:erasure", "retry:erasure", "end:erasure"]
        );
    }

    #[test]
    fn test_no_retries_configured() {
        let task = RecordingTask::default();
        let mut calls = 0;
        let result: Result<(), KeyError> =
            retry(&task, &RetryPolicy::new(0, 0.0, 0.0), ActionType::Access, (), || {
                calls += 1;
                Err(KeyError("x".to_string()))
            });
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert_eq!(task.count("retry:"), 0);
    }

    #[test]
    fn test_skip_short_circuits() {
        let disabled = RecordingTask {
            disabled: true,
            ..Default::default()
        };
        let mut calls = 0;
        let result: Result<Vec<u8>, KeyError> =
            retry(&disabled, &RetryPolicy::default(), ActionType::Access, vec![7], || {
                calls += 1;
                Ok(vec![1])
            });
        assert_eq!(result, Ok(vec![7]));
        assert_eq!(calls, 0);
        assert!(disabled.events.borrow().is_empty());

        let action_disabled = RecordingTask {
            disabled_action: Some(ActionType::Erasure),
            ..Default::default()
        };
        let result: Result<u32, KeyError> =
            retry(&action_disabled, &RetryPolicy::default(), ActionType::Erasure, 0, || Ok(1));
        assert_eq!(result, Ok(0));
        assert!(action_disabled.events.borrow().is_empty());

        let result: Result<u32, KeyError> =
            retry(&action_disabled, &RetryPolicy::default(), ActionType::Access, 0, || Ok(1));
        assert_eq!(result, Ok(1));
    }

    #[test]
    fn test_backoff_delays() {
        let policy = RetryPolicy::new(3, 1.0, 1.0);
        assert_eq!(
            policy.delays().collect::<Vec<_>>(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert!(RetryPolicy::new(2, -1.0, 0.0)
            .delays()
            .all(|d| d.is_zero()));
    }

    #[test]
    fn test_long_backoff_saturates() {
        let delays: Vec<Duration> = RetryPolicy::new(70, 1.0, 1.0).delays().collect();
        assert_eq!(delays.len(), 70);
        assert_eq!(delays[60], Duration::from_secs(1 << 60));
        assert_eq!(delays[64], Duration::MAX);
        assert_eq!(delays[69], Duration::MAX);
        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
