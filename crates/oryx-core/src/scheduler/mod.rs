//! Activities: one OS thread of control each
//!
//! An [`Activity`] is the per-thread execution context (frame stack, runtime
//! handle). Its [`ActivityHandle`] is the shareable side used by other
//! activities to park/release it and to join its thread. The
//! [`ActivityManager`] tracks live activities and the wait-for graph used for
//! deadlock detection.

mod activity;
mod frame;
mod manager;

pub use activity::{Activity, ActivityHandle, ActivityId, ActivityState};
pub use frame::{DispatchRecord, Frame};
pub use manager::{ActivityManager, ActivityStats};
