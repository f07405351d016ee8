//! Activity handles and the per-thread execution context

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::atomic::AtomicCell;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::frame::{DispatchRecord, Frame};
use crate::class::ScopeId;
use crate::code::{CallContext, CallType, Code};
use crate::dispatch;
use crate::message::MessageRef;
use crate::runtime::Runtime;
use crate::security::SecurityManagerRef;
use crate::selector::Selector;
use crate::value::Value;
use crate::{RuntimeError, RuntimeResult};

/// Unique identifier for an activity
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivityId(u64);

static NEXT_ACTIVITY_ID: AtomicU64 = AtomicU64::new(1);

impl ActivityId {
    /// Generate a new unique ActivityId
    pub fn new() -> Self {
        ActivityId(NEXT_ACTIVITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Create an ActivityId from a u64 value
    pub fn from_u64(id: u64) -> Self {
        ActivityId(id)
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of an activity
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActivityState {
    /// Handle created, thread not yet running
    Created,
    /// Executing
    Running,
    /// Parked until released
    Waiting,
    /// Body returned; the activity will not run again
    Finished,
}

struct ActivityShared {
    id: ActivityId,
    name: String,
    state: AtomicCell<ActivityState>,
    /// Release token consumed by `park`
    released: Mutex<bool>,
    release_signal: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Shareable handle to an activity
#[derive(Clone)]
pub struct ActivityHandle(Arc<ActivityShared>);

impl ActivityHandle {
    pub(crate) fn new(id: ActivityId, name: String) -> Self {
        ActivityHandle(Arc::new(ActivityShared {
            id,
            name,
            state: AtomicCell::new(ActivityState::Created),
            released: Mutex::new(false),
            release_signal: Condvar::new(),
            thread: Mutex::new(None),
        }))
    }

    /// Activity id
    pub fn id(&self) -> ActivityId {
        self.0.id
    }

    /// Thread name of the activity
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Current state
    pub fn state(&self) -> ActivityState {
        self.0.state.load()
    }

    pub(crate) fn set_state(&self, state: ActivityState) {
        self.0.state.store(state);
    }

    /// Whether the activity's body has returned
    pub fn is_finished(&self) -> bool {
        self.state() == ActivityState::Finished
    }

    /// Block the calling thread until the activity is released.
    ///
    /// Must be called from the activity's own thread. A release that arrives
    /// before the park is not lost.
    pub fn park(&self) {
        self.set_state(ActivityState::Waiting);
        let mut released = self.0.released.lock();
        while !*released {
            self.0.release_signal.wait(&mut released);
        }
        *released = false;
        drop(released);
        self.set_state(ActivityState::Running);
    }

    /// Wake a parked activity, or let its next park return immediately
    pub fn release(&self) {
        let mut released = self.0.released.lock();
        *released = true;
        self.0.release_signal.notify_one();
    }

    pub(crate) fn set_thread(&self, handle: JoinHandle<()>) {
        *self.0.thread.lock() = Some(handle);
    }

    /// Wait for a spawned activity's thread to exit.
    ///
    /// Returns false for attached activities, when called from the activity's
    /// own thread, or when the body panicked.
    pub fn join(&self) -> bool {
        let handle = {
            let mut slot = self.0.thread.lock();
            match slot.as_ref() {
                Some(handle) if handle.thread().id() == thread::current().id() => return false,
                Some(_) => slot.take(),
                None => None,
            }
        };
        match handle {
            Some(handle) => handle.join().is_ok(),
            None => false,
        }
    }

    /// Whether both handles name the same activity
    pub fn ptr_eq(&self, other: &ActivityHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ActivityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityHandle")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Execution context of one thread: its frame stack and runtime
pub struct Activity {
    handle: ActivityHandle,
    runtime: Arc<Runtime>,
    /// Never empty: the root frame is not popped
    frames: Vec<Frame>,
}

impl Activity {
    pub(crate) fn new(runtime: Arc<Runtime>, handle: ActivityHandle) -> Self {
        let security = runtime.options().security_manager.clone();
        handle.set_state(ActivityState::Running);
        Self {
            handle,
            runtime,
            frames: vec![Frame::root(security)],
        }
    }

    /// Activity id
    pub fn id(&self) -> ActivityId {
        self.handle.id()
    }

    /// Shareable handle
    pub fn handle(&self) -> &ActivityHandle {
        &self.handle
    }

    /// Runtime this activity belongs to
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Number of activations above the root frame
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Fail with a stack overflow once another activation would exceed the
    /// configured call depth
    pub fn check_stack_depth(&self) -> RuntimeResult<()> {
        let max = self.runtime.options().max_call_depth;
        if self.depth() >= max {
            return Err(RuntimeError::StackOverflow(max));
        }
        Ok(())
    }

    /// All frames, root first
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Innermost activation
    pub fn current_frame(&self) -> &Frame {
        let top = self.frames.len() - 1;
        &self.frames[top]
    }

    /// Innermost activation, mutably
    pub fn current_frame_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Receiver of the innermost activation
    pub fn current_receiver(&self) -> Option<&Value> {
        self.current_frame().receiver()
    }

    /// Last dispatch performed from the innermost activation
    pub fn last_dispatch(&self) -> Option<&DispatchRecord> {
        self.current_frame().last_dispatch()
    }

    /// Security manager of the innermost activation
    pub fn security_manager(&self) -> Option<&SecurityManagerRef> {
        self.current_frame().security_manager()
    }

    /// Install a security manager on the innermost activation; activations
    /// created from it inherit it
    pub fn set_security_manager(&mut self, security: Option<SecurityManagerRef>) {
        self.current_frame_mut().set_security_manager(security);
    }

    /// Message whose send the innermost activation is delivering
    pub fn pending_notification(&self) -> Option<&MessageRef> {
        self.current_frame().error_notify()
    }

    /// Send `selector` to `receiver`
    pub fn send(&mut self, receiver: &Value, selector: &str, args: &[Value]) -> RuntimeResult<Value> {
        dispatch::send_message(self, receiver, &Selector::new(selector), args, None)
    }

    /// Send `selector` to `receiver`, starting lookup after `scope`
    pub fn send_super(
        &mut self,
        receiver: &Value,
        selector: &str,
        args: &[Value],
        scope: ScopeId,
    ) -> RuntimeResult<Value> {
        dispatch::send_message(self, receiver, &Selector::new(selector), args, Some(scope))
    }

    /// Run `code` as a routine on a new activation
    pub fn call_routine(
        &mut self,
        code: &Code,
        name: &Selector,
        args: &[Value],
        call_type: CallType,
        environment: Option<&str>,
        context: &CallContext,
    ) -> RuntimeResult<Option<Value>> {
        trace!(routine = %name, call_type = ?call_type, "calling routine");
        code.call(self, None, name, args, call_type, environment, context)
    }
}

impl Drop for Activity {
    fn drop(&mut self) {
        self.handle.set_state(ActivityState::Finished);
        self.runtime.activities().retire(self.handle.id());
    }
}

impl fmt::Debug for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activity")
            .field("id", &self.handle.id())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeOptions;
    use std::time::Duration;

    #[test]
    fn test_release_before_park_is_kept() {
        let handle = ActivityHandle::new(ActivityId::new(), "t".to_string());
        handle.release();
        handle.park();
        assert_eq!(handle.state(), ActivityState::Running);
    }

    #[test]
    fn test_park_release_across_threads() {
        let handle = ActivityHandle::new(ActivityId::new(), "t".to_string());
        let parked = handle.clone();
        let worker = thread::spawn(move || parked.park());

        thread::sleep(Duration::from_millis(20));
        handle.release();
        worker.join().unwrap();
    }

    #[test]
    fn test_stack_depth_limit() {
        let runtime = Runtime::with_options(RuntimeOptions::default().with_max_call_depth(2));
        let mut activity = runtime.attach_activity();
        assert_eq!(activity.depth(), 0);
        assert!(activity.check_stack_depth().is_ok());

        let ctx = CallContext::default();
        activity.push_frame(Frame::for_routine(Selector::new("a"), CallType::Subroutine, None, &ctx, None));
        activity.push_frame(Frame::for_routine(Selector::new("b"), CallType::Subroutine, None, &ctx, None));
        assert_eq!(activity.check_stack_depth(), Err(RuntimeError::StackOverflow(2)));

        activity.pop_frame();
        activity.pop_frame();
        assert!(activity.pop_frame().is_none());
        assert_eq!(activity.depth(), 0);
    }

    #[test]
    fn test_attached_activity_retires_on_drop() {
        let runtime = Runtime::new();
        let activity = runtime.attach_activity();
        let id = activity.id();
        assert!(runtime.activities().get(id).is_some());
        assert!(!activity.handle().join());
        drop(activity);
        assert!(runtime.activities().get(id).is_none());
    }

    #[test]
    fn test_spawned_activity_runs_on_named_thread() {
        let runtime = Runtime::new();
        let handle = runtime
            .spawn_activity(|activity| {
                let name = thread::current().name().map(str::to_string);
                assert_eq!(name.as_deref(), Some(activity.handle().name()));
            })
            .unwrap();
        assert!(handle.join());
        assert!(handle.is_finished());
    }
}
