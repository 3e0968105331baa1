//! Retry policy for a single link
//!
//! Fixed-interval retries with a bounded failure count. The link itself is probed and kicked
//! by the caller; this type only decides *when* to attempt and *whether* the failure budget
//! is spent.
//!
//! ```text
//!        attempt due             up-check true
//! Down ───────────────► Attempting ────────────► Up
//!  ▲                        │  ▲                  │
//!  │                        └──┘ (retry interval) │
//!  └──────────────────────────────────────────────┘
//!                   up-check false
//! ```

use tracing::{debug, info, warn};

use crate::hardware::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPolicy {
    pub retry_interval_ms: u64,
    /// Escalate once the consecutive failure count exceeds this
    pub max_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Down,
    Attempting,
    Up,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionAttemptState {
    pub is_up: bool,
    pub consecutive_failures: u32,
    /// `None` until the first attempt, which makes that attempt immediate
    pub last_attempt: Option<Millis>,
}

/// What the caller should do with the link this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStep {
    /// Link is up; `established` is set on the tick it came up
    Up { established: bool },
    /// Link is down and an attempt is due now
    AttemptDue,
    /// Link is down, retry interval not yet elapsed
    Waiting,
}

pub struct LinkSupervisor {
    name: &'static str,
    policy: LinkPolicy,
    state: ConnectionAttemptState,
    phase: LinkPhase,
}

impl LinkSupervisor {
    pub fn new(name: &'static str, policy: LinkPolicy) -> Self {
        Self {
            name,
            policy,
            state: ConnectionAttemptState::default(),
            phase: LinkPhase::Down,
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn state(&self) -> &ConnectionAttemptState {
        &self.state
    }

    pub fn is_up(&self) -> bool {
        self.state.is_up
    }

    /// Feeds this tick's up-check result and reports what to do next
    pub fn poll(&mut self, now: Millis, up: bool) -> LinkStep {
        if up {
            let established = !self.state.is_up;
            if established {
                info!(
                    "{} link up after {} attempt(s)",
                    self.name, self.state.consecutive_failures
                );
                self.state.is_up = true;
                self.state.consecutive_failures = 0;
                self.phase = LinkPhase::Up;
            }
            return LinkStep::Up { established };
        }

        if self.state.is_up {
            warn!("{} link lost", self.name);
            self.state.is_up = false;
            self.phase = LinkPhase::Down;
        }

        let due = match self.state.last_attempt {
            None => true,
            Some(last) => now.since(last) >= self.policy.retry_interval_ms,
        };
        if due {
            LinkStep::AttemptDue
        } else {
            LinkStep::Waiting
        }
    }

    /// Books an attempt made at `now`. Returns `true` when the failure budget is exceeded.
    pub fn record_attempt(&mut self, now: Millis) -> bool {
        self.state.last_attempt = Some(now);
        self.state.consecutive_failures += 1;
        self.phase = LinkPhase::Attempting;
        debug!(
            "{} attempt #{} at {}ms",
            self.name, self.state.consecutive_failures, now.0
        );
        self.state.consecutive_failures > self.policy.max_failures
    }

    /// Forgets accumulated failures and keeps retrying
    pub fn forgive(&mut self) {
        info!(
            "{} failure budget reset after {} attempts",
            self.name, self.state.consecutive_failures
        );
        self.state.consecutive_failures = 0;
    }
}
