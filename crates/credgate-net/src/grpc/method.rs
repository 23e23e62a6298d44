//! RPC method identity.

use std::fmt;

/// Describes one RPC method by its fully qualified name.
///
/// Full names have the form `package.Service/Method`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    full_method_name: String,
}

impl MethodDescriptor {
    /// Create a descriptor for a method.
    pub fn new(full_method_name: impl Into<String>) -> Self {
        Self {
            full_method_name: full_method_name.into(),
        }
    }

    /// The fully qualified method name.
    pub fn full_method_name(&self) -> &str {
        &self.full_method_name
    }

    /// The `package.Service` part of the full name, if the name contains a `/`.
    pub fn service_name(&self) -> Option<&str> {
        self.full_method_name
            .rfind('/')
            .map(|index| &self.full_method_name[..index])
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_method_name)
    }
}
