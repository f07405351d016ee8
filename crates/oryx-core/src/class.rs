//! Classes and the class registry
//!
//! A class is a named method dictionary with an optional superclass. Its id
//! doubles as the scope id that methods are bound to and that per-object
//! variable pools are keyed by. Every registered class owns a primitive
//! [`Behavior`] shared by all of its plain instances.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::behavior::Behavior;
use crate::method::{Method, MethodRef};
use crate::selector::Selector;
use crate::{RuntimeError, RuntimeResult};

/// Class identifier, index into the [`ClassRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

/// A scope is identified by the class that defines it
pub type ScopeId = ClassId;

impl ClassId {
    /// Wrap a registry index
    pub const fn from_index(index: usize) -> Self {
        ClassId(index)
    }

    /// Registry index
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class#{}", self.0)
    }
}

/// Shared class handle
pub type ClassRef = Arc<Class>;

/// A class: name, superclass and method dictionary
pub struct Class {
    id: ClassId,
    name: Arc<str>,
    superclass: Option<ClassRef>,
    methods: RwLock<FxHashMap<Selector, MethodRef>>,
}

impl Class {
    fn new(id: ClassId, name: &str, superclass: Option<ClassRef>) -> Self {
        Self {
            id,
            name: Arc::from(name.to_ascii_uppercase()),
            superclass,
            methods: RwLock::new(FxHashMap::default()),
        }
    }

    /// Class id (and scope id)
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Upper-cased class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct superclass
    pub fn superclass(&self) -> Option<&ClassRef> {
        self.superclass.as_ref()
    }

    /// Method defined directly in this class
    pub fn method(&self, selector: &Selector) -> Option<MethodRef> {
        self.methods.read().get(selector).cloned()
    }

    /// Define (or replace) a method, binding it to this class's scope
    pub fn define_method(&self, selector: Selector, method: Method) -> MethodRef {
        let bound = Arc::new(method).bind_scope(self.id);
        self.methods.write().insert(selector, bound.clone());
        bound
    }

    /// Install an already shared method, rebinding it to this scope if needed
    pub fn install_method(&self, selector: Selector, method: &MethodRef) -> MethodRef {
        let bound = method.bind_scope(self.id);
        self.methods.write().insert(selector, bound.clone());
        bound
    }

    /// Remove a method, returning it if it was defined here
    pub fn remove_method(&self, selector: &Selector) -> Option<MethodRef> {
        self.methods.write().remove(selector)
    }

    /// Number of methods defined directly in this class
    pub fn method_count(&self) -> usize {
        self.methods.read().len()
    }

    /// Snapshot of the methods defined directly in this class
    pub fn methods(&self) -> Vec<(Selector, MethodRef)> {
        self.methods
            .read()
            .iter()
            .map(|(selector, method)| (selector.clone(), method.clone()))
            .collect()
    }

    /// This class followed by its superclasses, nearest first
    pub fn scope_chain(self: &Arc<Self>) -> Vec<ClassRef> {
        let mut chain = vec![Arc::clone(self)];
        let mut current = self.superclass.clone();
        while let Some(class) = current {
            current = class.superclass.clone();
            chain.push(class);
        }
        chain
    }

    /// Whether `other` is this class or one of its superclasses
    pub fn is_subclass_of(&self, other: ClassId) -> bool {
        if self.id == other {
            return true;
        }
        let mut current = self.superclass.as_ref();
        while let Some(class) = current {
            if class.id == other {
                return true;
            }
            current = class.superclass.as_ref();
        }
        false
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|c| c.id))
            .field("methods", &self.method_count())
            .finish()
    }
}

struct ClassEntry {
    class: ClassRef,
    behavior: Arc<Behavior>,
}

#[derive(Default)]
struct RegistryInner {
    classes: Vec<ClassEntry>,
    name_to_id: FxHashMap<Arc<str>, ClassId>,
}

/// Registry of all classes, shared by every activity of a runtime
pub struct ClassRegistry {
    inner: RwLock<RegistryInner>,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register a new class.
    ///
    /// Redefining an existing name replaces the name mapping; the previous
    /// class stays reachable by id.
    pub fn define(&self, name: &str, superclass: Option<ClassId>) -> RuntimeResult<ClassId> {
        let mut inner = self.inner.write();
        let superclass = match superclass {
            Some(id) => Some(
                inner
                    .classes
                    .get(id.index())
                    .map(|entry| entry.class.clone())
                    .ok_or_else(|| RuntimeError::UnknownClass(id.to_string()))?,
            ),
            None => None,
        };

        let id = ClassId(inner.classes.len());
        let class = Arc::new(Class::new(id, name, superclass));
        let behavior = Arc::new(Behavior::primitive(&class));
        inner.name_to_id.insert(Arc::from(class.name()), id);
        inner.classes.push(ClassEntry { class, behavior });
        Ok(id)
    }

    /// Get class by ID
    pub fn get(&self, id: ClassId) -> Option<ClassRef> {
        self.inner
            .read()
            .classes
            .get(id.index())
            .map(|entry| entry.class.clone())
    }

    /// Get class by name (case-insensitive)
    pub fn get_by_name(&self, name: &str) -> Option<ClassRef> {
        let inner = self.inner.read();
        inner
            .name_to_id
            .get(name.to_ascii_uppercase().as_str())
            .and_then(|id| inner.classes.get(id.index()))
            .map(|entry| entry.class.clone())
    }

    /// Primitive behavior shared by plain instances of the class
    pub fn behavior(&self, id: ClassId) -> Option<Arc<Behavior>> {
        self.inner
            .read()
            .classes
            .get(id.index())
            .map(|entry| entry.behavior.clone())
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.inner.read().classes.len()
    }

    /// Whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered classes in id order
    pub fn classes(&self) -> Vec<ClassRef> {
        self.inner
            .read()
            .classes
            .iter()
            .map(|entry| entry.class.clone())
            .collect()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Arity, Code};
    use crate::value::Value;

    fn constant(value: i64) -> Method {
        Method::new(Code::native("CONST", Arity::exact(0), move |_, _| {
            Ok(Value::Integer(value))
        }))
    }

    #[test]
    fn test_registry_define_and_lookup() {
        let registry = ClassRegistry::new();
        let object = registry.define("Object", None).unwrap();
        let point = registry.define("Point", Some(object)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(point).unwrap().name(), "POINT");
        assert_eq!(registry.get_by_name("point").unwrap().id(), point);
        assert!(registry.get_by_name("Missing").is_none());
    }

    #[test]
    fn test_registry_unknown_superclass() {
        let registry = ClassRegistry::new();
        let err = registry.define("Orphan", Some(ClassId::from_index(9))).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownClass(_)));
    }

    #[test]
    fn test_scope_chain_nearest_first() {
        let registry = ClassRegistry::new();
        let a = registry.define("A", None).unwrap();
        let b = registry.define("B", Some(a)).unwrap();
        let c = registry.define("C", Some(b)).unwrap();

        let chain: Vec<ClassId> = registry
            .get(c)
            .unwrap()
            .scope_chain()
            .iter()
            .map(|class| class.id())
            .collect();
        assert_eq!(chain, vec![c, b, a]);
        assert!(registry.get(c).unwrap().is_subclass_of(a));
        assert!(!registry.get(a).unwrap().is_subclass_of(c));
    }

    #[test]
    fn test_define_method_binds_scope() {
        let registry = ClassRegistry::new();
        let a = registry.define("A", None).unwrap();
        let class = registry.get(a).unwrap();

        let method = class.define_method(Selector::new("value"), constant(1));
        assert_eq!(method.scope(), Some(a));
        assert_eq!(class.method_count(), 1);
        assert!(class.method(&Selector::new("VALUE")).is_some());
        assert!(class.remove_method(&Selector::new("value")).is_some());
        assert_eq!(class.method_count(), 0);
    }
}
