//! # Layout Scheduler
//!
//! Decides when a layout pass runs. Interactive edits arrive in bursts, so
//! most requests are debounced: each one pushes the deadline out by the
//! debounce window and the pass runs once the host polls after it. Requests
//! that need a result now (document load, explicit relayout) run
//! immediately and swallow whatever was pending.
//!
//! ```text
//! Idle ──request_debounced──▶ Pending(deadline) ──poll past deadline──▶ Running ──▶ Idle
//!   ▲                            │   ▲  │
//!   │                            │   └──┘ request_debounced (re-arm)
//!   └────────── cancel ──────────┘
//! ```
//!
//! The scheduler never runs anything on its own: the host calls
//! [`LayoutScheduler::poll`] from its event loop or timer.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::model::NodeId;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// How an edit wants its layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleMode {
    #[default]
    Debounced,
    Immediate,
}

/// What the next pass should do beyond laying out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutRequest {
    /// Node to keep stationary on screen.
    pub anchor: Option<NodeId>,
}

impl LayoutRequest {
    pub fn anchored(id: impl Into<NodeId>) -> Self {
        Self {
            anchor: Some(id.into()),
        }
    }

    /// Fold a later request into this one; the latest anchor wins.
    pub fn merge(&mut self, later: LayoutRequest) {
        if later.anchor.is_some() {
            self.anchor = later.anchor;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending { deadline: Duration },
    Running,
}

pub struct LayoutScheduler {
    clock: Arc<dyn Clock>,
    debounce: Duration,
    state: SchedulerState,
    request: LayoutRequest,
    runs: u64,
}

impl std::fmt::Debug for LayoutScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutScheduler")
            .field("debounce", &self.debounce)
            .field("state", &self.state)
            .field("request", &self.request)
            .field("runs", &self.runs)
            .finish()
    }
}

impl LayoutScheduler {
    pub fn new(clock: Arc<dyn Clock>, debounce: Duration) -> Self {
        Self {
            clock,
            debounce,
            state: SchedulerState::Idle,
            request: LayoutRequest::default(),
            runs: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn deadline(&self) -> Option<Duration> {
        match self.state {
            SchedulerState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline().is_some()
    }

    /// Passes run so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Change the window. A pending deadline is left as it is; the next
    /// request arms with the new window.
    pub fn set_debounce(&mut self, debounce: Duration) {
        self.debounce = debounce;
    }

    /// Arm (or re-arm) the deadline at `now + debounce`.
    pub fn request_debounced(&mut self, request: LayoutRequest) {
        self.request.merge(request);
        let deadline = self.clock.now() + self.debounce;
        self.state = SchedulerState::Pending { deadline };
    }

    /// Run `pass` if the pending deadline has passed.
    pub fn poll<T>(&mut self, pass: impl FnOnce(LayoutRequest) -> T) -> Option<T> {
        let deadline = self.deadline()?;
        let now = self.clock.now();
        if now < deadline {
            return None;
        }
        let overshoot = now - deadline;
        if overshoot.as_millis() > 5 {
            tracing::debug!(
                overshoot_ms = overshoot.as_millis() as u64,
                "layout debounce overshoot"
            );
        }
        Some(self.run(pass))
    }

    /// Cancel anything pending and run `pass` now with the merged request.
    pub fn run_immediate<T>(
        &mut self,
        request: LayoutRequest,
        pass: impl FnOnce(LayoutRequest) -> T,
    ) -> T {
        self.request.merge(request);
        self.run(pass)
    }

    /// Drop the pending request, returning it if there was one.
    pub fn cancel(&mut self) -> Option<LayoutRequest> {
        if !self.is_pending() {
            return None;
        }
        self.state = SchedulerState::Idle;
        Some(std::mem::take(&mut self.request))
    }

    fn run<T>(&mut self, pass: impl FnOnce(LayoutRequest) -> T) -> T {
        self.state = SchedulerState::Running;
        let request = std::mem::take(&mut self.request);
        let out = pass(request);
        self.runs += 1;
        self.state = SchedulerState::Idle;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn scheduler() -> (Arc<ManualClock>, LayoutScheduler) {
        let clock = Arc::new(ManualClock::new());
        let scheduler = LayoutScheduler::new(clock.clone(), DEFAULT_DEBOUNCE);
        (clock, scheduler)
    }

    #[test]
    fn burst_coalesces_into_one_pass() {
        let (clock, mut s) = scheduler();
        for _ in 0..5 {
            s.request_debounced(LayoutRequest::default());
            clock.advance(Duration::from_millis(20));
            assert!(s.poll(|_| ()).is_none());
        }
        clock.advance(Duration::from_millis(50));
        assert_eq!(s.poll(|_| 7), Some(7));
        assert_eq!(s.runs(), 1);
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(s.poll(|_| ()).is_none());
    }

    #[test]
    fn rearm_pushes_deadline() {
        let (clock, mut s) = scheduler();
        s.request_debounced(LayoutRequest::default());
        assert_eq!(s.deadline(), Some(Duration::from_millis(50)));
        clock.advance(Duration::from_millis(30));
        s.request_debounced(LayoutRequest::default());
        assert_eq!(s.deadline(), Some(Duration::from_millis(80)));
    }

    #[test]
    fn latest_anchor_wins() {
        let (clock, mut s) = scheduler();
        s.request_debounced(LayoutRequest::anchored("a"));
        s.request_debounced(LayoutRequest::anchored("b"));
        s.request_debounced(LayoutRequest::default());
        clock.advance(DEFAULT_DEBOUNCE);
        let anchor = s.poll(|req| req.anchor).flatten();
        assert_eq!(anchor.as_deref(), Some("b"));
    }

    #[test]
    fn immediate_cancels_pending_and_runs_once() {
        let (clock, mut s) = scheduler();
        s.request_debounced(LayoutRequest::anchored("a"));
        let anchor = s.run_immediate(LayoutRequest::default(), |req| req.anchor);
        assert_eq!(anchor.as_deref(), Some("a"));
        assert_eq!(s.runs(), 1);
        clock.advance(Duration::from_secs(1));
        assert!(s.poll(|_| ()).is_none());
        assert_eq!(s.runs(), 1);
    }

    #[test]
    fn cancel_drops_request() {
        let (clock, mut s) = scheduler();
        assert!(s.cancel().is_none());
        s.request_debounced(LayoutRequest::anchored("a"));
        assert_eq!(s.cancel(), Some(LayoutRequest::anchored("a")));
        clock.advance(Duration::from_secs(1));
        assert!(s.poll(|_| ()).is_none());
        let anchor = s.run_immediate(LayoutRequest::default(), |req| req.anchor);
        assert!(anchor.is_none());
    }
}
