//! Selectors and message names
//!
//! Selectors are case-insensitive: they are normalized to upper case when
//! created so that `greet`, `Greet` and `GREET` name the same method.

use std::fmt;
use std::sync::Arc;

use crate::class::ScopeId;
use crate::defaults::UNKNOWN_SELECTOR;

/// Interned-by-value message selector
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(Arc<str>);

impl Selector {
    /// Create a selector, normalizing to upper case
    pub fn new(name: &str) -> Self {
        if name.bytes().any(|b| b.is_ascii_lowercase()) {
            Selector(Arc::from(name.to_ascii_uppercase()))
        } else {
            Selector(Arc::from(name))
        }
    }

    /// The `UNKNOWN` fallback selector
    pub fn unknown() -> Self {
        Selector(Arc::from(UNKNOWN_SELECTOR))
    }

    /// Selector text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `UNKNOWN` selector
    pub fn is_unknown(&self) -> bool {
        &*self.0 == UNKNOWN_SELECTOR
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::new(name)
    }
}

impl From<&Selector> for Selector {
    fn from(selector: &Selector) -> Self {
        selector.clone()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self.0)
    }
}

/// Name carried by a message: a plain selector, or a selector with an
/// explicit starting scope for super-style lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageName {
    /// Ordinary lookup
    Plain(Selector),
    /// Lookup starting after the given scope
    Scoped(Selector, ScopeId),
}

impl MessageName {
    /// The selector part
    pub fn selector(&self) -> &Selector {
        match self {
            MessageName::Plain(selector) | MessageName::Scoped(selector, _) => selector,
        }
    }

    /// The explicit starting scope, if any
    pub fn start_scope(&self) -> Option<ScopeId> {
        match self {
            MessageName::Plain(_) => None,
            MessageName::Scoped(_, scope) => Some(*scope),
        }
    }
}

impl From<&str> for MessageName {
    fn from(name: &str) -> Self {
        MessageName::Plain(Selector::new(name))
    }
}

impl From<Selector> for MessageName {
    fn from(selector: Selector) -> Self {
        MessageName::Plain(selector)
    }
}

impl From<(&str, ScopeId)> for MessageName {
    fn from((name, scope): (&str, ScopeId)) -> Self {
        MessageName::Scoped(Selector::new(name), scope)
    }
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageName::Plain(selector) => write!(f, "{}", selector),
            MessageName::Scoped(selector, scope) => write!(f, "{}:{}", selector, scope),
        }
    }
}
