//! Sweep timers.
//!
//! A [`TimerPool`] holds one-shot and looping timers keyed by a tag type.
//! Handlers connected to a tag run with a caller-supplied context whenever a
//! timer carrying that tag fires:
//!
//! ```text
//! update(dt, ctx)
//!   1. advance one-shot timers, fire the expired ones immediately, drop them
//!   2. advance looping timers, reset and queue the ones that reached their period
//!   3. deliver the queue in FIFO order
//! ```
//!
//! A typical use is a looping timer whose handler flushes the deferred
//! removals of a world once per period.

mod dispatcher;
mod pool;

pub use dispatcher::HandlerId;
pub use pool::{Delta, Sink, TimerPool};
