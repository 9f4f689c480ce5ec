//! Sliding-window rate limiter.
//!
//! The window is a FIFO of admission instants. Every query first evicts the
//! instants that have aged out of the trailing window, then compares the
//! remaining count against the capacity. Eviction, the capacity check and
//! the append of a new admission always happen under one lock hold, so two
//! callers can never both observe the last free slot.
//!
//! Time comes from [`tokio::time::Instant`], which lets tests drive the
//! window with a paused clock.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::LimiterError;

/// Extra sleep added on top of the computed wait in [`RateLimiter::acquire`].
pub const ACQUIRE_BUFFER: Duration = Duration::from_millis(100);

/// Smallest burst window, regardless of the main window length.
const MIN_BURST_WINDOW: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Window state
// ---------------------------------------------------------------------------

/// Mutable part of a limiter, only touched under the limiter's mutex.
#[derive(Debug)]
struct WindowState {
    /// Admission instants, oldest first.
    stamps: VecDeque<Instant>,
    /// Current capacity (the adaptive layer may change it).
    capacity: u32,
    /// Admission is refused until this instant, if set.
    suspended_until: Option<Instant>,
}

impl WindowState {
    /// Drop admissions older than `window` and lift an elapsed suspension.
    fn evict(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
        if self.suspended_until.is_some_and(|until| now >= until) {
            self.suspended_until = None;
        }
    }

    fn in_window(&self) -> u32 {
        u32::try_from(self.stamps.len()).unwrap_or(u32::MAX)
    }

    fn has_headroom(&self) -> bool {
        self.suspended_until.is_none() && self.in_window() < self.capacity
    }

    /// How long until one slot frees up. Call only when there is no headroom.
    ///
    /// When the capacity was shrunk below the number of admissions in the
    /// window, several admissions must age out before one slot is free.
    fn wait_for_slot(&self, now: Instant, window: Duration) -> Duration {
        if let Some(until) = self.suspended_until {
            return until.saturating_duration_since(now);
        }
        let capacity = usize::try_from(self.capacity).unwrap_or(usize::MAX);
        let excess = self.stamps.len().saturating_sub(capacity);
        self.stamps.get(excess).map_or(Duration::ZERO, |&stamp| {
            window.saturating_sub(now.saturating_duration_since(stamp))
        })
    }

    fn reset_at(&self, window: Duration) -> Option<Instant> {
        if let Some(until) = self.suspended_until {
            return Some(until);
        }
        self.stamps
            .front()
            .and_then(|&oldest| oldest.checked_add(window))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Point-in-time view of a limiter, for logs and status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStatus {
    /// Current capacity.
    pub capacity: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Admissions inside the trailing window.
    pub in_window: u32,
    /// Admissions still available right now.
    pub remaining: u32,
    /// Whether the next request would have to wait.
    pub limited: bool,
    /// Milliseconds until the window resets, if anything is in it.
    pub reset_in_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Sliding-window admission control with a burst allowance.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    buffer: Duration,
    burst_allowance: u32,
    burst_window: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Create a limiter admitting `capacity` requests per trailing `window`.
    ///
    /// A capacity of zero is accepted and rejects every request.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::InvalidWindow`] if `window` is zero.
    pub fn new(capacity: u32, window: Duration) -> Result<Self, LimiterError> {
        if window.is_zero() {
            return Err(LimiterError::InvalidWindow);
        }
        Ok(Self {
            window,
            buffer: ACQUIRE_BUFFER,
            burst_allowance: (capacity / 3).max(1),
            burst_window: window
                .checked_div(6)
                .unwrap_or_default()
                .max(MIN_BURST_WINDOW),
            state: Mutex::new(WindowState {
                stamps: VecDeque::with_capacity(
                    usize::try_from(capacity).unwrap_or_default(),
                ),
                capacity,
                suspended_until: None,
            }),
        })
    }

    /// Replace the buffer slept on top of each computed wait.
    #[must_use]
    pub const fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit one request if the window has room, without waiting.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut state = self.lock();
        state.evict(now, self.window);
        if state.has_headroom() {
            state.stamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Wait until the window has room, then admit one request.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::ZeroCapacity`] if the limiter can never
    /// admit anything.
    pub async fn acquire(&self) -> Result<(), LimiterError> {
        loop {
            let wait = {
                let now = Instant::now();
                let mut state = self.lock();
                if state.capacity == 0 {
                    return Err(LimiterError::ZeroCapacity);
                }
                state.evict(now, self.window);
                if state.has_headroom() {
                    state.stamps.push_back(now);
                    return Ok(());
                }
                state.wait_for_slot(now, self.window)
            };
            tracing::trace!(wait_ms = wait.as_millis(), "rate limiter full, waiting");
            tokio::time::sleep(wait.saturating_add(self.buffer)).await;
        }
    }

    /// Whether a request would be admitted right now. Consumes nothing.
    pub fn has_headroom(&self) -> bool {
        let now = Instant::now();
        let mut state = self.lock();
        state.evict(now, self.window);
        state.has_headroom()
    }

    /// Whether a burst of `size` requests fits in the burst allowance.
    pub fn can_burst(&self, size: u32) -> bool {
        let now = Instant::now();
        let state = self.lock();
        let recent = state
            .stamps
            .iter()
            .filter(|&&stamp| now.saturating_duration_since(stamp) <= self.burst_window)
            .count();
        u32::try_from(recent)
            .unwrap_or(u32::MAX)
            .saturating_add(size)
            <= self.burst_allowance
    }

    /// Admissions still available in the current window.
    pub fn remaining(&self) -> u32 {
        let now = Instant::now();
        let mut state = self.lock();
        state.evict(now, self.window);
        if state.suspended_until.is_some() {
            return 0;
        }
        state.capacity.saturating_sub(state.in_window())
    }

    /// When the oldest admission leaves the window (or a suspension ends).
    ///
    /// `None` when the window is empty and nothing is suspended.
    pub fn reset_at(&self) -> Option<Instant> {
        let now = Instant::now();
        let mut state = self.lock();
        state.evict(now, self.window);
        state.reset_at(self.window)
    }

    /// Whether the next request would have to wait.
    pub fn is_limited(&self) -> bool {
        !self.has_headroom()
    }

    /// Current capacity.
    pub fn capacity(&self) -> u32 {
        self.lock().capacity
    }

    /// Window length.
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Largest burst the limiter tolerates inside its burst window.
    pub const fn burst_allowance(&self) -> u32 {
        self.burst_allowance
    }

    /// Snapshot of counters for reporting.
    pub fn status(&self) -> LimiterStatus {
        let now = Instant::now();
        let mut state = self.lock();
        state.evict(now, self.window);
        let in_window = state.in_window();
        let remaining = if state.suspended_until.is_some() {
            0
        } else {
            state.capacity.saturating_sub(in_window)
        };
        let reset_in_ms = state.reset_at(self.window).map(|at| {
            u64::try_from(at.saturating_duration_since(now).as_millis()).unwrap_or(u64::MAX)
        });
        LimiterStatus {
            capacity: state.capacity,
            window_secs: self.window.as_secs(),
            in_window,
            remaining,
            limited: !state.has_headroom(),
            reset_in_ms,
        }
    }

    /// Change the capacity. Admissions already in the window stay counted.
    pub(crate) fn set_capacity(&self, capacity: u32) {
        self.lock().capacity = capacity;
    }

    /// Refuse admission for `duration`. A later suspension wins.
    pub(crate) fn suspend_for(&self, duration: Duration) {
        let now = Instant::now();
        let Some(until) = now.checked_add(duration) else {
            return;
        };
        let mut state = self.lock();
        if state.suspended_until.is_none_or(|current| current < until) {
            state.suspended_until = Some(until);
        }
    }
}
