//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, outcomes recorded into a sliding window
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls probe for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: window holds >= minimum_calls samples and failure rate >= threshold
//! Open → Half-Open: wait_duration_open elapsed (checked lazily on admission)
//! Half-Open → Closed: every trial call succeeded (window cleared)
//! Half-Open → Open: any trial call failed
//! ```
//!
//! # Design Decisions
//! - One breaker per policy name, never global
//! - Mode changes only through recorded outcomes and elapsed time
//! - Trial permits are guards; an abandoned trial hands its slot back
//! - Every transition bumps an epoch; permits from an older epoch report
//!   into nothing

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::PolicyConfig;
use crate::observability::metrics;
use crate::resilience::error::CallError;

/// Breaker mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn gauge_value(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

/// Fixed-size ring of the most recent call outcomes.
#[derive(Debug)]
struct OutcomeWindow {
    /// `true` marks a failure.
    slots: Vec<bool>,
    next: usize,
    len: usize,
    failures: usize,
}

impl OutcomeWindow {
    fn new(size: usize) -> Self {
        Self {
            slots: vec![false; size.max(1)],
            next: 0,
            len: 0,
            failures: 0,
        }
    }

    fn record(&mut self, failed: bool) {
        if self.len == self.slots.len() {
            // Overwriting the oldest sample.
            if self.slots[self.next] {
                self.failures -= 1;
            }
        } else {
            self.len += 1;
        }
        self.slots[self.next] = failed;
        if failed {
            self.failures += 1;
        }
        self.next = (self.next + 1) % self.slots.len();
    }

    fn failure_rate(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        self.failures as f32 * 100.0 / self.len as f32
    }

    fn clear(&mut self) {
        self.next = 0;
        self.len = 0;
        self.failures = 0;
    }
}

#[derive(Debug)]
struct State {
    mode: CircuitState,
    window: OutcomeWindow,
    opened_at: Option<Instant>,
    half_open_permits: usize,
    half_open_successes: usize,
    epoch: u64,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_rate: f32,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    /// Remaining open time, if currently open.
    pub open_remaining: Option<Duration>,
}

/// Sliding-window circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_rate_threshold: f32,
    minimum_calls: usize,
    wait_duration_open: Duration,
    permitted_calls_half_open: usize,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            name: config.name.clone(),
            failure_rate_threshold: config.failure_rate_threshold,
            minimum_calls: config.minimum_calls,
            wait_duration_open: config.wait_duration_open(),
            permitted_calls_half_open: config.permitted_calls_half_open,
            state: Mutex::new(State {
                mode: CircuitState::Closed,
                window: OutcomeWindow::new(config.sliding_window_size),
                opened_at: None,
                half_open_permits: 0,
                half_open_successes: 0,
                epoch: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, st: &mut State, to: CircuitState, now: Instant) {
        let from = st.mode;
        st.mode = to;
        st.epoch += 1;
        match to {
            CircuitState::Open => {
                st.opened_at = Some(now);
                tracing::warn!(
                    policy = %self.name,
                    from = ?from,
                    failure_rate = st.window.failure_rate(),
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                st.half_open_permits = self.permitted_calls_half_open;
                st.half_open_successes = 0;
                tracing::info!(policy = %self.name, "Circuit breaker half-open, probing dependency");
            }
            CircuitState::Closed => {
                st.opened_at = None;
                st.window.clear();
                tracing::info!(policy = %self.name, "Circuit breaker closed");
            }
        }
        metrics::record_breaker_state(&self.name, to.gauge_value());
    }

    /// Move Open → Half-Open once the wait has elapsed.
    fn refresh_locked(&self, st: &mut State, now: Instant) {
        if st.mode == CircuitState::Open {
            if let Some(opened_at) = st.opened_at {
                if now >= opened_at + self.wait_duration_open {
                    self.transition(st, CircuitState::HalfOpen, now);
                }
            }
        }
    }

    /// Current mode, accounting for an elapsed open period.
    pub fn state(&self) -> CircuitState {
        let mut st = self.lock();
        self.refresh_locked(&mut st, Instant::now());
        st.mode
    }

    /// Ask for permission to invoke the dependency.
    pub fn try_acquire(self: &Arc<Self>) -> Result<BreakerPermit, CallError> {
        let now = Instant::now();
        let mut st = self.lock();
        self.refresh_locked(&mut st, now);

        match st.mode {
            CircuitState::Closed => Ok(BreakerPermit::new(self.clone(), false, st.epoch)),
            CircuitState::HalfOpen if st.half_open_permits > 0 => {
                st.half_open_permits -= 1;
                Ok(BreakerPermit::new(self.clone(), true, st.epoch))
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                metrics::record_rejection(&self.name, "circuit_open");
                Err(CallError::CircuitOpen {
                    policy: self.name.clone(),
                })
            }
        }
    }

    /// Record into the window and trip once it is full enough and failing.
    fn record_closed(&self, st: &mut State, failed: bool, now: Instant) {
        st.window.record(failed);
        if st.window.len >= self.minimum_calls && st.window.failure_rate() >= self.failure_rate_threshold {
            self.transition(st, CircuitState::Open, now);
        }
    }

    fn on_success(&self, trial: bool, epoch: u64) {
        let now = Instant::now();
        let mut st = self.lock();
        if st.epoch != epoch {
            // Admitted before the last transition.
            return;
        }
        match st.mode {
            CircuitState::Closed => self.record_closed(&mut st, false, now),
            CircuitState::HalfOpen if trial => {
                st.half_open_successes += 1;
                if st.half_open_successes >= self.permitted_calls_half_open {
                    self.transition(&mut st, CircuitState::Closed, now);
                }
            }
            _ => {}
        }
    }

    fn on_failure(&self, trial: bool, epoch: u64) {
        let now = Instant::now();
        let mut st = self.lock();
        if st.epoch != epoch {
            return;
        }
        match st.mode {
            CircuitState::Closed => self.record_closed(&mut st, true, now),
            CircuitState::HalfOpen if trial => self.transition(&mut st, CircuitState::Open, now),
            _ => {}
        }
    }

    fn on_abandoned(&self, trial: bool, epoch: u64) {
        if !trial {
            return;
        }
        let mut st = self.lock();
        if st.epoch == epoch && st.mode == CircuitState::HalfOpen {
            st.half_open_permits += 1;
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let mut st = self.lock();
        self.refresh_locked(&mut st, now);
        let open_remaining = match (st.mode, st.opened_at) {
            (CircuitState::Open, Some(at)) => {
                Some((at + self.wait_duration_open).saturating_duration_since(now))
            }
            _ => None,
        };
        CircuitBreakerSnapshot {
            state: st.mode,
            failure_rate: st.window.failure_rate(),
            buffered_calls: st.window.len,
            failed_calls: st.window.failures,
            open_remaining,
        }
    }
}

/// Permission to make one call; report its outcome by consuming the permit.
///
/// Dropping the permit without reporting records nothing.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    epoch: u64,
    settled: bool,
}

impl BreakerPermit {
    fn new(breaker: Arc<CircuitBreaker>, trial: bool, epoch: u64) -> Self {
        Self {
            breaker,
            trial,
            epoch,
            settled: false,
        }
    }

    /// Whether this call is a half-open probe.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial, self.epoch);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial, self.epoch);
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandoned(self.trial, self.epoch);
        }
    }
}
