//! Asynchronous message objects
//!
//! A [`Message`] captures a target, a message name and arguments, and can be
//! delivered exactly once: synchronously with [`Message::send`] or on a new
//! activity with [`Message::start`]. Other activities collect the outcome
//! with [`Message::result`], which parks the caller until the message
//! completes and refuses to wait when waiting would deadlock.
//!
//! Lifecycle:
//!
//! ```text
//! Idle ──send──────────────▶ SendPending ──▶ Completed(result | condition)
//!   └──start──▶ StartPending ──send (new activity)──▶ SendPending
//! ```
//!
//! Waiters and interested parties are only touched under the message's own
//! lock, and registration re-checks completion under that same lock, so a
//! party is either notified by the completion phase or sent immediately.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dispatch::send_message;
use crate::gc::{GcTraceable, Tracer};
use crate::runtime::Runtime;
use crate::scheduler::{Activity, ActivityHandle, ActivityId};
use crate::selector::MessageName;
use crate::value::Value;
use crate::{ReuseReason, RuntimeError, RuntimeResult};

/// Unique identifier for a message
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

impl MessageId {
    /// Generate a new unique MessageId
    pub fn new() -> Self {
        MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFlags {
    /// Delivery has begun
    pub sent: bool,
    /// Started; delivery not yet begun on the new activity
    pub start_pending: bool,
    /// Completed with a result or a condition
    pub result_returned: bool,
    /// Completed with a condition
    pub raise_error: bool,
    /// The condition was handed to at least one `result` caller
    pub error_reported: bool,
    /// The completion phase has finished notifying interested parties
    pub all_notified: bool,
}

struct MessageState {
    target: Value,
    args: Arc<[Value]>,
    result: Option<Value>,
    condition: Option<RuntimeError>,
    /// Messages sent when this one completes, FIFO
    interested: VecDeque<MessageRef>,
    /// Parked activities waiting for completion, FIFO
    waiters: VecDeque<ActivityHandle>,
    flags: MessageFlags,
    /// Activity delivering (or about to deliver) the send
    owner: Option<ActivityHandle>,
    /// Activity a pending start handed the send to
    starter: Option<ActivityId>,
}

/// Shared message handle
pub type MessageRef = Arc<Message>;

/// A first-class pending or completed send
pub struct Message {
    id: MessageId,
    name: MessageName,
    state: Mutex<MessageState>,
}

impl Message {
    /// Create an idle message
    pub fn new(target: Value, name: impl Into<MessageName>, args: Vec<Value>) -> MessageRef {
        Arc::new(Self {
            id: MessageId::new(),
            name: name.into(),
            state: Mutex::new(MessageState {
                target,
                args: Arc::from(args),
                result: None,
                condition: None,
                interested: VecDeque::new(),
                waiters: VecDeque::new(),
                flags: MessageFlags::default(),
                owner: None,
                starter: None,
            }),
        })
    }

    /// Message identity
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Message name (plain or scoped)
    pub fn name(&self) -> &MessageName {
        &self.name
    }

    /// Current target
    pub fn target(&self) -> Value {
        self.state.lock().target.clone()
    }

    /// Current arguments
    pub fn arguments(&self) -> Vec<Value> {
        self.state.lock().args.to_vec()
    }

    /// Snapshot of the lifecycle flags
    pub fn flags(&self) -> MessageFlags {
        self.state.lock().flags
    }

    /// Whether the message has completed
    pub fn is_completed(&self) -> bool {
        self.state.lock().flags.result_returned
    }

    /// Whether the message completed with a condition
    pub fn has_error(&self) -> bool {
        self.state.lock().flags.raise_error
    }

    /// Stored condition, without marking it reported
    pub fn error_condition(&self) -> Option<RuntimeError> {
        self.state.lock().condition.clone()
    }

    /// Stored result, without waiting
    pub fn peek_result(&self) -> Option<Value> {
        self.state.lock().result.clone()
    }

    /// Activity delivering the send
    pub fn owner(&self) -> Option<ActivityId> {
        self.state.lock().owner.as_ref().map(ActivityHandle::id)
    }

    fn reuse(&self, reason: ReuseReason) -> RuntimeError {
        RuntimeError::MessageReuse {
            message: self.id,
            reason,
        }
    }

    fn validate_scope(&self, runtime: &Runtime, target: &Value) -> RuntimeResult<()> {
        if let Some(scope) = self.name.start_scope() {
            let valid = runtime
                .behavior_of(target)
                .map_or(false, |behavior| behavior.check_scope(scope));
            if !valid {
                return Err(RuntimeError::InvalidScope {
                    scope,
                    receiver: target.describe(),
                });
            }
        }
        Ok(())
    }

    /// Send `other` when this message completes, or right away if it
    /// already has
    pub fn notify(self: &Arc<Self>, activity: &mut Activity, other: MessageRef) {
        {
            let mut state = self.state.lock();
            if !state.flags.result_returned {
                state.interested.push_back(other);
                return;
            }
        }
        if let Err(err) = other.send(activity, None) {
            debug!(message = %other.id, error = %err, "notification send failed");
        }
    }

    /// Deliver the message on the calling activity and return its outcome
    pub fn send(self: &Arc<Self>, activity: &mut Activity, receiver: Option<Value>) -> RuntimeResult<Value> {
        self.send_with(activity, receiver, None)
    }

    /// [`send`](Self::send) with an optional argument override
    pub fn send_with(
        self: &Arc<Self>,
        activity: &mut Activity,
        receiver: Option<Value>,
        args: Option<Vec<Value>>,
    ) -> RuntimeResult<Value> {
        let me = activity.handle().clone();
        let (target, args) = {
            let mut state = self.state.lock();
            if state.flags.sent || state.flags.result_returned {
                return Err(self.reuse(ReuseReason::AlreadySent));
            }
            let entitled = state.flags.start_pending;
            if entitled && state.starter != Some(me.id()) {
                return Err(self.reuse(ReuseReason::StartPending));
            }

            let target = receiver.unwrap_or_else(|| state.target.clone());
            if let Err(err) = self.validate_scope(activity.runtime(), &target) {
                if entitled {
                    // a started send has nobody to report to but its waiters
                    state.flags.sent = true;
                    state.flags.start_pending = false;
                    drop(state);
                    self.complete(activity, Err(err.clone()));
                }
                return Err(err);
            }

            state.target = target.clone();
            if let Some(args) = args {
                state.args = Arc::from(args);
            }
            state.flags.sent = true;
            state.flags.start_pending = false;
            state.owner = Some(me.clone());
            (target, state.args.clone())
        };

        debug!(message = %self.id, name = %self.name, activity = %me.id(), "message sent");
        activity.current_frame_mut().set_error_notify(Arc::clone(self));
        let outcome = send_message(
            activity,
            &target,
            self.name.selector(),
            &args,
            self.name.start_scope(),
        );
        match &outcome {
            Ok(value) => {
                self.complete(activity, Ok(value.clone()));
            }
            Err(err) => {
                self.error(activity, err.clone());
            }
        }
        outcome
    }

    /// Deliver the message on a new activity; returns without waiting
    pub fn start(self: &Arc<Self>, activity: &mut Activity, receiver: Option<Value>) -> RuntimeResult<ActivityHandle> {
        self.start_with(activity, receiver, None)
    }

    /// [`start`](Self::start) with an optional argument override
    pub fn start_with(
        self: &Arc<Self>,
        activity: &mut Activity,
        receiver: Option<Value>,
        args: Option<Vec<Value>>,
    ) -> RuntimeResult<ActivityHandle> {
        let runtime = Arc::clone(activity.runtime());
        let handle = {
            let mut state = self.state.lock();
            if state.flags.sent || state.flags.result_returned {
                return Err(self.reuse(ReuseReason::AlreadySent));
            }
            if state.flags.start_pending {
                return Err(self.reuse(ReuseReason::AlreadyStarted));
            }

            let target = receiver.unwrap_or_else(|| state.target.clone());
            self.validate_scope(&runtime, &target)?;
            state.target = target;
            if let Some(args) = args {
                state.args = Arc::from(args);
            }

            let handle = runtime.activities().create_handle();
            state.flags.start_pending = true;
            state.starter = Some(handle.id());
            state.owner = Some(handle.clone());
            handle
        };

        debug!(message = %self.id, name = %self.name, activity = %handle.id(), "message started");
        let message = Arc::clone(self);
        let report = runtime.options().report_unobserved_errors;
        let spawned = runtime.spawn_on(&handle, move |activity| {
            // the outcome is stored on the message and surfaces through result()
            let _ = message.send(activity, None);
            if report {
                message.report_unobserved();
            }
        });

        if let Err(err) = spawned {
            {
                let mut state = self.state.lock();
                state.flags.start_pending = false;
                state.starter = None;
                state.owner = None;
            }
            runtime.activities().retire(handle.id());
            return Err(err);
        }
        Ok(handle)
    }

    /// Block until the message completes, then return its result or raise
    /// its condition. Fails with a deadlock error instead of blocking when
    /// the owner is (transitively) waiting on the caller.
    pub fn result(self: &Arc<Self>, activity: &Activity) -> RuntimeResult<Value> {
        self.await_completion(activity)?;
        let mut state = self.state.lock();
        if let Some(condition) = state.condition.clone() {
            state.flags.error_reported = true;
            return Err(condition);
        }
        Ok(state.result.clone().unwrap_or_default())
    }

    /// Block until the message completes without raising its condition
    pub fn wait(self: &Arc<Self>, activity: &Activity) -> RuntimeResult<()> {
        self.await_completion(activity)
    }

    fn await_completion(&self, activity: &Activity) -> RuntimeResult<()> {
        let me = activity.handle().clone();
        let manager = activity.runtime().activities();
        let owner = {
            let mut state = self.state.lock();
            if state.flags.result_returned {
                return Ok(());
            }
            let owner = state.owner.as_ref().map(ActivityHandle::id);
            if let Some(owner) = owner {
                manager.begin_wait(me.id(), owner)?;
            }
            state.waiters.push_back(me.clone());
            owner
        };

        debug!(message = %self.id, activity = %me.id(), "waiting for result");
        while !self.is_completed() {
            me.park();
        }
        if let Some(owner) = owner {
            manager.end_wait_on(me.id(), owner);
        }
        Ok(())
    }

    /// Complete the message with `condition`.
    ///
    /// Returns false when the message had already completed.
    pub fn error(self: &Arc<Self>, activity: &mut Activity, condition: RuntimeError) -> bool {
        if self.is_completed() {
            return false;
        }
        debug!(message = %self.id, error = %condition, "message raised a condition");
        self.complete(activity, Err(condition))
    }

    fn complete(self: &Arc<Self>, activity: &mut Activity, outcome: RuntimeResult<Value>) -> bool {
        let (owner, waiters, parties) = {
            let mut state = self.state.lock();
            if state.flags.result_returned {
                return false;
            }
            match outcome {
                Ok(value) => state.result = Some(value),
                Err(condition) => {
                    state.condition = Some(condition);
                    state.flags.raise_error = true;
                }
            }
            state.flags.result_returned = true;
            // a condition awaited by a parked caller counts as observed
            if state.flags.raise_error && !state.waiters.is_empty() {
                state.flags.error_reported = true;
            }
            let owner = state.owner.as_ref().map(ActivityHandle::id);
            (owner, mem::take(&mut state.waiters), mem::take(&mut state.interested))
        };

        activity.current_frame_mut().clear_error_notify(self);
        debug!(
            message = %self.id,
            waiters = waiters.len(),
            parties = parties.len(),
            "message completed"
        );
        let manager = activity.runtime().activities();
        for waiter in waiters {
            // drop the edge before waking, so the waiter is not counted as
            // waiting once it has been released
            if let Some(owner) = owner {
                manager.end_wait_on(waiter.id(), owner);
            }
            waiter.release();
        }
        for party in parties {
            if let Err(err) = party.send(activity, None) {
                debug!(message = %party.id, error = %err, "notification send failed");
            }
        }
        self.state.lock().flags.all_notified = true;
        true
    }

    fn report_unobserved(&self) {
        let state = self.state.lock();
        if let Some(condition) = &state.condition {
            if !state.flags.error_reported {
                warn!(
                    message = %self.id,
                    name = %self.name,
                    error = %condition,
                    "started message failed and nobody has retrieved the error"
                );
            }
        }
    }
}

impl GcTraceable for Message {
    fn trace(&self, tracer: &mut dyn Tracer) {
        let state = self.state.lock();
        tracer.visit_value(&state.target);
        for arg in state.args.iter() {
            tracer.visit_value(arg);
        }
        if let Some(result) = &state.result {
            tracer.visit_value(result);
        }
        for party in &state.interested {
            tracer.visit_value(&Value::Message(Arc::clone(party)));
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("flags", &self.flags())
            .finish()
    }
}
