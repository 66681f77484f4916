//! Batch orchestration engine for the vmscale harness.
//!
//! The engine layers four mechanisms that every scale scenario is built
//! from: timed operation capture ([`timing`]), condition polling
//! ([`poll`]), bounded fan-out over homogeneous operations ([`fanout`]) and
//! the batch lifecycle that composes them over real platform resources
//! ([`lifecycle`]). Fleet-wide waits ([`waits`]) and control-plane idle
//! detection ([`monitor`]) round out the toolkit.

pub mod fanout;
pub mod lifecycle;
pub mod monitor;
pub mod poll;
pub mod timing;
pub mod waits;

// Re-export commonly used types
pub use fanout::{FanOutError, FanOutExecutor, FanOutPolicy};
pub use lifecycle::{
    BatchError, BatchState, ResourceFailure, RunError, ScaleBatch, ScaleBatchBuilder,
};
pub use monitor::{IdleMonitor, IDLE_RATE_PER_HANDLER};
pub use poll::{PollError, PollPolicy, Poller};
pub use timing::{phase, phase_key, CaptureError, Clock, SystemClock, TimedCapture};
pub use waits::{BatchWaiter, WaitError};
