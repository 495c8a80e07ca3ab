//! Time abstraction for debounce timers and id seeding
//!
//! Production code sleeps on tokio's timer. Tests drive a
//! [`VirtualTimeProvider`] by hand so debounce windows are deterministic.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Trait for providing time in tests and production
pub trait TimeProvider: Send + Sync + 'static {
    /// Get the current UTC datetime
    fn utc_now(&self) -> DateTime<Utc>;

    /// Sleep for a duration measured from the moment this is called
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// Production time provider that uses real system time
#[derive(Clone, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Virtual time provider for testing
#[derive(Clone, Debug)]
pub struct VirtualTimeProvider {
    inner: Arc<Mutex<VirtualClock>>,
}

#[derive(Debug)]
struct VirtualClock {
    now: DateTime<Utc>,
    timers: Vec<VirtualTimer>,
}

/// A virtual timer that can be resolved when time advances
#[derive(Debug)]
struct VirtualTimer {
    deadline: DateTime<Utc>,
    waker: Waker,
}

impl Default for VirtualTimeProvider {
    fn default() -> Self {
        Self::new_at(Utc::now())
    }
}

impl VirtualTimeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a virtual time provider starting at a specific time
    pub fn new_at(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VirtualClock {
                now: start,
                timers: Vec::new(),
            })),
        }
    }

    /// Advance time by a duration, waking every timer that came due
    pub fn advance(&self, duration: Duration) {
        let due: Vec<Waker> = {
            let mut clock = self.inner.lock();
            clock.now += chrono::Duration::from_std(duration)
                .unwrap_or(chrono::Duration::zero());
            let now = clock.now;
            let (due, pending): (Vec<_>, Vec<_>) = clock
                .timers
                .drain(..)
                .partition(|timer| timer.deadline <= now);
            clock.timers = pending;
            due.into_iter().map(|timer| timer.waker).collect()
        };
        for waker in due {
            waker.wake();
        }
    }

    /// Get the number of registered, unexpired timers
    pub fn pending_timers(&self) -> usize {
        self.inner.lock().timers.len()
    }
}

impl TimeProvider for VirtualTimeProvider {
    fn utc_now(&self) -> DateTime<Utc> {
        self.inner.lock().now
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        let deadline = self.utc_now()
            + chrono::Duration::from_std(duration)
                .unwrap_or(chrono::Duration::zero());
        Box::pin(VirtualSleep {
            clock: self.inner.clone(),
            deadline,
            registered: false,
        })
    }
}

/// Future that completes when virtual time advances past a deadline
struct VirtualSleep {
    clock: Arc<Mutex<VirtualClock>>,
    deadline: DateTime<Utc>,
    registered: bool,
}

impl Future for VirtualSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut clock = self.clock.lock();
        if clock.now >= self.deadline {
            return Poll::Ready(());
        }
        if !self.registered {
            clock.timers.push(VirtualTimer {
                deadline: self.deadline,
                waker: cx.waker().clone(),
            });
            drop(clock);
            self.registered = true;
        }
        Poll::Pending
    }
}
