//! Burst debouncing for change notifications.
//!
//! A single editor save typically produces a flurry of filesystem events:
//! a temp-file write, a rename, auto-save chatter. The [`Debouncer`]
//! collapses each burst into one notification with an explicit two-state
//! machine:
//!
//! ```text
//!            qualifying event
//!   Idle ───────────────────────> emit, enter Cooldown(now + window)
//!
//!            qualifying event, now < deadline
//!   Cooldown ───────────────────> suppress (dropped, not queued)
//!
//!            qualifying event, now >= deadline
//!   Cooldown ───────────────────> emit, re-enter Cooldown
//! ```
//!
//! Events arriving inside the window are dropped rather than queued: a
//! burst whose last write lands inside the window was already covered by
//! the leading emission, and a later save produces a fresh notification.
//! The machine is a pure function of `(state, now)`, so the burst
//! properties are testable without timers or sleeps.

use std::time::{Duration, Instant};

/// The outcome of offering one qualifying event to the [`Debouncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    /// The event opens a new burst: emit exactly one notification.
    Emit,
    /// The event falls inside the cooldown window: drop it.
    Suppress,
}

impl DebounceDecision {
    /// Returns `true` for [`DebounceDecision::Emit`].
    #[inline]
    #[must_use]
    pub const fn is_emit(self) -> bool {
        matches!(self, Self::Emit)
    }
}

/// Two-state (`Idle`/`Cooldown`) burst suppressor.
///
/// # Examples
///
/// ```
/// use lm_watcher::{DebounceDecision, Debouncer};
/// use std::time::{Duration, Instant};
///
/// let mut debouncer = Debouncer::new(Duration::from_millis(100));
/// let t0 = Instant::now();
///
/// assert_eq!(debouncer.observe(t0), DebounceDecision::Emit);
/// assert_eq!(
///     debouncer.observe(t0 + Duration::from_millis(50)),
///     DebounceDecision::Suppress,
/// );
/// assert_eq!(
///     debouncer.observe(t0 + Duration::from_millis(150)),
///     DebounceDecision::Emit,
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer {
    /// Cooldown window length.
    window: Duration,

    /// End of the current cooldown; `None` means `Idle`.
    cooldown_until: Option<Instant>,
}

impl Debouncer {
    /// Creates an idle debouncer with the given cooldown window.
    #[inline]
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            cooldown_until: None,
        }
    }

    /// Offers one qualifying event observed at `now`.
    ///
    /// Emitting moves the machine into `Cooldown` until `now + window`.
    /// A cooldown whose deadline has passed counts as `Idle`; the state
    /// lapses lazily, on the next observation.
    pub fn observe(&mut self, now: Instant) -> DebounceDecision {
        match self.cooldown_until {
            Some(deadline) if now < deadline => DebounceDecision::Suppress,
            _ => {
                self.cooldown_until = Some(now + self.window);
                DebounceDecision::Emit
            }
        }
    }

    /// Returns `true` if an event observed at `now` would be suppressed.
    #[inline]
    #[must_use]
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|deadline| now < deadline)
    }
}
