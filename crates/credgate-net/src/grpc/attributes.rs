//! Typed attribute sets exposed by transports and streams.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;

/// The security guarantee negotiated for a transport.
///
/// Levels are ordered: a higher level implies every guarantee of the lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SecurityLevel {
    /// No security guarantee.
    #[default]
    None,
    /// Messages are authenticated but not encrypted.
    Integrity,
    /// Messages are authenticated and encrypted.
    PrivacyAndIntegrity,
}

/// A typed key into an [`Attributes`] set.
///
/// Keys compare by name, so two keys with the same name and type address the
/// same entry.
pub struct AttributeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    /// Create a key with the given debug name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Get the key's name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AttributeKey").field(&self.name).finish()
    }
}

/// The negotiated security level of a transport.
pub const ATTR_SECURITY_LEVEL: AttributeKey<SecurityLevel> =
    AttributeKey::new("credgate.security-level");

/// The remote address a transport is connected to.
pub const ATTR_REMOTE_ADDR: AttributeKey<SocketAddr> = AttributeKey::new("credgate.remote-addr");

/// An immutable, cheaply clonable set of typed attributes.
#[derive(Clone, Default)]
pub struct Attributes {
    entries: Arc<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
}

impl Attributes {
    /// An empty attribute set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start building a new attribute set.
    pub fn builder() -> AttributesBuilder {
        AttributesBuilder {
            entries: HashMap::new(),
        }
    }

    /// Start building from a copy of this set.
    pub fn to_builder(&self) -> AttributesBuilder {
        AttributesBuilder {
            entries: (*self.entries).clone(),
        }
    }

    /// Get the value stored under `key`.
    pub fn get<T: Clone + 'static>(&self, key: &AttributeKey<T>) -> Option<T> {
        self.entries
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Check whether a value is stored under `key`.
    pub fn contains<T: 'static>(&self, key: &AttributeKey<T>) -> bool {
        self.entries
            .get(key.name)
            .is_some_and(|value| value.is::<T>())
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Attributes").field("keys", &names).finish()
    }
}

/// Builder for [`Attributes`].
#[derive(Default)]
pub struct AttributesBuilder {
    entries: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl AttributesBuilder {
    /// Set the value for `key`, replacing any previous value.
    pub fn set<T: Send + Sync + 'static>(mut self, key: &AttributeKey<T>, value: T) -> Self {
        self.entries.insert(key.name, Arc::new(value));
        self
    }

    /// Remove the value for `key`.
    pub fn discard<T>(mut self, key: &AttributeKey<T>) -> Self {
        self.entries.remove(key.name);
        self
    }

    /// Build the attribute set.
    pub fn build(self) -> Attributes {
        Attributes {
            entries: Arc::new(self.entries),
        }
    }
}
