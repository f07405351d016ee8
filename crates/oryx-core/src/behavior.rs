//! Behaviors: method tables with scope-chained resolution
//!
//! A behavior is immutable once shared. Objects hold an `Arc<Behavior>` and
//! replace it with an enhanced clone when an instance method is added or
//! removed, so siblings sharing the primitive behavior never see the change.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::class::{ClassRef, ScopeId};
use crate::method::MethodRef;
use crate::selector::Selector;

/// Instance methods plus the class scope chain
#[derive(Clone)]
pub struct Behavior {
    /// Defining class followed by its superclasses, nearest first
    scopes: Arc<[ClassRef]>,
    /// Per-instance methods, consulted before any class
    instance_methods: FxHashMap<Selector, MethodRef>,
    /// One-off behavior owned by a single object
    enhanced: bool,
}

impl Behavior {
    /// Shared behavior of plain instances of `class`
    pub fn primitive(class: &ClassRef) -> Self {
        Self {
            scopes: Arc::from(class.scope_chain()),
            instance_methods: FxHashMap::default(),
            enhanced: false,
        }
    }

    /// Class whose instances use this behavior
    pub fn owning_class(&self) -> &ClassRef {
        &self.scopes[0]
    }

    /// Scope chain, nearest first
    pub fn scopes(&self) -> &[ClassRef] {
        &self.scopes
    }

    /// Whether this is a per-instance clone
    pub fn is_enhanced(&self) -> bool {
        self.enhanced
    }

    /// Resolve a selector: instance methods first, then every scope in order
    pub fn lookup(&self, selector: &Selector) -> Option<MethodRef> {
        if let Some(method) = self.instance_methods.get(selector) {
            return Some(method.clone());
        }
        self.scopes.iter().find_map(|class| class.method(selector))
    }

    /// Resolve a selector in the scopes strictly after `start`.
    ///
    /// Instance methods are not consulted. A `start` that is not part of the
    /// chain resolves nothing.
    pub fn super_lookup(&self, selector: &Selector, start: ScopeId) -> Option<MethodRef> {
        let position = self.scopes.iter().position(|class| class.id() == start)?;
        self.scopes[position + 1..]
            .iter()
            .find_map(|class| class.method(selector))
    }

    /// Whether `scope` is part of the chain
    pub fn check_scope(&self, scope: ScopeId) -> bool {
        self.scopes.iter().any(|class| class.id() == scope)
    }

    /// Whether the selector resolves at all
    pub fn has_method(&self, selector: &Selector) -> bool {
        self.lookup(selector).is_some()
    }

    /// Per-instance method, if defined
    pub fn instance_method(&self, selector: &Selector) -> Option<MethodRef> {
        self.instance_methods.get(selector).cloned()
    }

    /// Number of per-instance methods
    pub fn instance_method_count(&self) -> usize {
        self.instance_methods.len()
    }

    /// Iterate over per-instance methods
    pub fn instance_methods(&self) -> impl Iterator<Item = (&Selector, &MethodRef)> {
        self.instance_methods.iter()
    }

    /// Enhanced copy with `method` added, bound to the owning class scope
    pub fn with_instance_method(&self, selector: Selector, method: &MethodRef) -> Behavior {
        let mut enhanced = self.clone();
        let bound = method.bind_scope(self.owning_class().id());
        enhanced.instance_methods.insert(selector, bound);
        enhanced.enhanced = true;
        enhanced
    }

    /// Enhanced copy with the instance method for `selector` removed
    pub fn without_instance_method(&self, selector: &Selector) -> Behavior {
        let mut enhanced = self.clone();
        enhanced.instance_methods.remove(selector);
        enhanced.enhanced = true;
        enhanced
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("class", &self.owning_class().name())
            .field("scopes", &self.scopes.len())
            .field("instance_methods", &self.instance_methods.len())
            .field("enhanced", &self.enhanced)
            .finish()
    }
}
