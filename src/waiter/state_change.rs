//! Bounded wait-for-condition poller
//!
//! Repeatedly calls a refresh function until the observed state leaves the
//! pending set, an error or failure state is observed, the deadline passes,
//! or the caller cancels.
//!
//! # Transition Rules
//!
//! Each observation is classified independently:
//!
//! 1. not-found error while waiting for disappearance → `Done(None)`
//! 2. any other error → `Error`
//! 3. state in the pending set → `Pending`, poll again
//! 4. state in the failure set → `Failed`
//! 5. anything else → `Done(Some(value))`
//!
//! The deadline covers the whole run; when it passes while still pending
//! the run ends in a timeout error distinct from the failure error.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Interval between successive refresh calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSchedule {
    /// Same interval after every poll
    Fixed(Duration),
    /// Interval doubles after every pending poll, capped at `max`
    Backoff { initial: Duration, max: Duration },
}

impl Default for PollSchedule {
    fn default() -> Self {
        PollSchedule::Backoff {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
        }
    }
}

impl PollSchedule {
    /// Interval to wait after the `poll`-th refresh (1-based).
    pub fn interval(&self, poll: u32) -> Duration {
        match *self {
            PollSchedule::Fixed(interval) => interval,
            PollSchedule::Backoff { initial, max } => {
                let factor = 1u32.checked_shl(poll.saturating_sub(1)).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Parameters of one wait run
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// Human readable subject, used in logs and errors
    pub resource: String,

    /// States that mean "keep polling"
    pub pending: Vec<String>,

    /// States that mean the remote side gave up
    pub failure: Vec<String>,

    /// Treat a not-found refresh error as successful completion
    pub absent_is_done: bool,

    /// Deadline for the whole run
    pub timeout: Duration,

    /// Wait before the first refresh
    pub delay: Duration,

    /// Interval between refreshes
    pub schedule: PollSchedule,

    /// Consecutive refresh errors tolerated before giving up (0 = none)
    pub max_consecutive_errors: u32,

    /// Aborts the run when triggered
    pub cancellation: Option<CancellationToken>,
}

impl StateChangeConf {
    pub fn new(resource: impl Into<String>, timeout: Duration) -> Self {
        Self {
            resource: resource.into(),
            pending: Vec::new(),
            failure: Vec::new(),
            absent_is_done: false,
            timeout,
            delay: Duration::ZERO,
            schedule: PollSchedule::default(),
            max_consecutive_errors: 0,
            cancellation: None,
        }
    }

    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn failure<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn absent_is_done(mut self, absent_is_done: bool) -> Self {
        self.absent_is_done = absent_is_done;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    pub fn cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }
}

// =============================================================================
// Observations
// =============================================================================

/// One observation returned by a refresh function
#[derive(Debug, Clone, PartialEq)]
pub struct Refresh<T> {
    /// Observed value, `None` when there is nothing to report
    pub value: Option<T>,
    /// State label used for classification
    pub state: String,
}

impl<T> Refresh<T> {
    pub fn new(value: T, state: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            state: state.into(),
        }
    }

    pub fn empty(state: impl Into<String>) -> Self {
        Self {
            value: None,
            state: state.into(),
        }
    }
}

/// Classification of one observation
#[derive(Debug)]
pub enum Transition<T> {
    /// Keep polling; carries the pending state
    Pending(String),
    /// Terminal success; `None` when the subject is gone
    Done(Option<T>),
    /// Terminal failure state reported by the remote side
    Failed(String),
    /// Refresh error
    Error(Error),
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOutcome<T> {
    /// Last observed value, `None` when the subject is gone
    pub value: Option<T>,
    /// Number of refresh calls made
    pub polls: u32,
    /// Time spent waiting
    pub elapsed: Duration,
}

// =============================================================================
// Poller
// =============================================================================

impl StateChangeConf {
    /// Classify one refresh result.
    pub fn classify<T>(&self, observation: Result<Refresh<T>>) -> Transition<T> {
        match observation {
            Err(e) if self.absent_is_done && e.is_not_found() => Transition::Done(None),
            Err(e) => Transition::Error(e),
            Ok(refresh) if self.pending.contains(&refresh.state) => {
                Transition::Pending(refresh.state)
            }
            Ok(refresh) if self.failure.contains(&refresh.state) => {
                Transition::Failed(refresh.state)
            }
            Ok(refresh) => Transition::Done(refresh.value),
        }
    }

    /// Poll `refresh` until the state converges.
    pub async fn wait_for_state<T, F, Fut>(&self, mut refresh: F) -> Result<WaitOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refresh<T>>>,
    {
        let started = Instant::now();
        let mut polls = 0u32;
        let mut last_state = String::new();

        let run = async {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }

            let mut consecutive_errors = 0u32;
            loop {
                polls += 1;
                match self.classify(refresh().await) {
                    Transition::Done(value) => {
                        debug!(resource = %self.resource, polls, "Wait converged");
                        return Ok(value);
                    }
                    Transition::Failed(state) => {
                        return Err(Error::ConvergenceFailure {
                            resource: self.resource.clone(),
                            state,
                        });
                    }
                    Transition::Error(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors > self.max_consecutive_errors {
                            return Err(e);
                        }
                        warn!(
                            resource = %self.resource,
                            attempt = consecutive_errors,
                            "Refresh failed, retrying: {}", e
                        );
                    }
                    Transition::Pending(state) => {
                        consecutive_errors = 0;
                        debug!(resource = %self.resource, state = %state, polls, "Still pending");
                        last_state = state;
                    }
                }

                sleep(self.schedule.interval(polls)).await;
            }
        };

        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let result = tokio::select! {
            res = timeout(self.timeout, run) => res,
            _ = cancelled => {
                return Err(Error::Cancelled {
                    resource: self.resource.clone(),
                });
            }
        };

        match result {
            Ok(Ok(value)) => Ok(WaitOutcome {
                value,
                polls,
                elapsed: started.elapsed(),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::ConvergenceTimeout {
                resource: self.resource.clone(),
                state: last_state,
                duration: format!("{:?}", self.timeout),
            }),
        }
    }
}
