//! Objects
//!
//! An object has an identity, exactly one current [`Behavior`] and one
//! variable pool per scope. Adding or removing an instance method swaps the
//! behavior handle for an enhanced clone, leaving siblings that share the
//! primitive behavior untouched.
//!
//! Guarded methods reserve the pool of their scope for the duration of the
//! call. A reservation is reentrant for the owning activity; other activities
//! block, registering the wait in the activity manager's wait-for graph so a
//! guard cycle is reported as a deadlock instead of hanging.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::behavior::Behavior;
use crate::class::{ClassRef, ScopeId};
use crate::method::MethodRef;
use crate::runtime::Runtime;
use crate::scheduler::{Activity, ActivityId};
use crate::selector::Selector;
use crate::value::Value;
use crate::RuntimeResult;

/// Unique identifier for an object
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    /// Generate a new unique ObjectId
    pub fn new() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
struct VariablePool {
    values: FxHashMap<Arc<str>, Value>,
    reserved_by: Option<ActivityId>,
    depth: usize,
    /// Activities blocked on the reservation
    waiting: Vec<ActivityId>,
}

/// Shared object handle
pub type ObjectRef = Arc<Object>;

/// A heap object
pub struct Object {
    id: ObjectId,
    class: ClassRef,
    behavior: RwLock<Arc<Behavior>>,
    pools: Mutex<FxHashMap<ScopeId, VariablePool>>,
    guard_released: Condvar,
}

impl Object {
    /// Create an instance of `class` using its primitive behavior
    pub fn new(class: ClassRef, behavior: Arc<Behavior>) -> Self {
        Self {
            id: ObjectId::new(),
            class,
            behavior: RwLock::new(behavior),
            pools: Mutex::new(FxHashMap::default()),
            guard_released: Condvar::new(),
        }
    }

    /// Object identity
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Class the object was created from
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Current behavior
    pub fn behavior(&self) -> Arc<Behavior> {
        self.behavior.read().clone()
    }

    /// Whether the object carries a one-off behavior
    pub fn has_enhanced_behavior(&self) -> bool {
        self.behavior.read().is_enhanced()
    }

    /// Add an instance method; the object switches to an enhanced behavior
    pub fn define_instance_method(&self, selector: Selector, method: &MethodRef) -> MethodRef {
        let mut behavior = self.behavior.write();
        let enhanced = behavior.with_instance_method(selector.clone(), method);
        let bound = enhanced
            .instance_method(&selector)
            .unwrap_or_else(|| Arc::clone(method));
        *behavior = Arc::new(enhanced);
        bound
    }

    /// Remove an instance method, returning whether one was defined
    pub fn remove_instance_method(&self, selector: &Selector) -> bool {
        let mut behavior = self.behavior.write();
        if behavior.instance_method(selector).is_none() {
            return false;
        }
        *behavior = Arc::new(behavior.without_instance_method(selector));
        true
    }

    /// Read an object variable in `scope`
    pub fn get_variable(&self, scope: ScopeId, name: &str) -> Option<Value> {
        let pools = self.pools.lock();
        pools
            .get(&scope)
            .and_then(|pool| pool.values.get(&*name.to_ascii_uppercase()).cloned())
    }

    /// Assign an object variable in `scope`
    pub fn set_variable(&self, scope: ScopeId, name: &str, value: Value) {
        let mut pools = self.pools.lock();
        pools
            .entry(scope)
            .or_default()
            .values
            .insert(Arc::from(name.to_ascii_uppercase()), value);
    }

    /// Snapshot of every variable as `(scope, name, value)`, ordered by scope
    /// then name
    pub fn variables(&self) -> Vec<(ScopeId, Arc<str>, Value)> {
        let pools = self.pools.lock();
        let mut out: Vec<(ScopeId, Arc<str>, Value)> = pools
            .iter()
            .flat_map(|(scope, pool)| {
                pool.values
                    .iter()
                    .map(move |(name, value)| (*scope, name.clone(), value.clone()))
            })
            .collect();
        out.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        out
    }

    /// Activity currently holding the guard of `scope`
    pub fn guard_owner(&self, scope: ScopeId) -> Option<ActivityId> {
        self.pools.lock().get(&scope).and_then(|pool| pool.reserved_by)
    }

    /// Reserve the variable pool of `scope` for the calling activity.
    ///
    /// Reentrant per activity. Blocks while another activity holds it and
    /// fails with a deadlock error when waiting would close a cycle.
    pub fn reserve(&self, activity: &Activity, scope: ScopeId) -> RuntimeResult<ScopeGuard<'_>> {
        let me = activity.id();
        let manager = activity.runtime().activities();
        let mut pools = self.pools.lock();
        loop {
            let pool = pools.entry(scope).or_default();
            match pool.reserved_by {
                None => {
                    pool.reserved_by = Some(me);
                    pool.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    pool.depth += 1;
                    break;
                }
                Some(owner) => {
                    manager.begin_wait(me, owner)?;
                    pool.waiting.push(me);
                    trace!(object = %self.id, activity = %me, owner = %owner, "waiting for guard");
                    self.guard_released.wait(&mut pools);
                    if let Some(pool) = pools.get_mut(&scope) {
                        pool.waiting.retain(|id| *id != me);
                    }
                    manager.end_wait_on(me, owner);
                }
            }
        }
        Ok(ScopeGuard {
            object: self,
            runtime: Arc::clone(activity.runtime()),
            scope,
        })
    }

    fn release(&self, runtime: &Runtime, scope: ScopeId) {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get_mut(&scope) {
            pool.depth = pool.depth.saturating_sub(1);
            if pool.depth == 0 {
                // blocked activities stop waiting on the old owner before
                // they are woken
                if let Some(owner) = pool.reserved_by.take() {
                    for waiter in &pool.waiting {
                        runtime.activities().end_wait_on(*waiter, owner);
                    }
                }
                self.guard_released.notify_all();
            }
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .field("enhanced", &self.has_enhanced_behavior())
            .finish()
    }
}

/// Held reservation of one scope's variable pool; released on drop
pub struct ScopeGuard<'a> {
    object: &'a Object,
    runtime: Arc<Runtime>,
    scope: ScopeId,
}

impl ScopeGuard<'_> {
    /// Reserved scope
    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.object.release(&self.runtime, self.scope);
    }
}
