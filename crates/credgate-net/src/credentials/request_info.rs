//! The per-call context handed to credentials.

use crate::grpc::{ATTR_SECURITY_LEVEL, Attributes, CallOptions, MethodDescriptor, SecurityLevel};

/// An immutable description of one call, as seen by a credential.
///
/// Built fresh for each call by [`RequestInfo::build`].
#[derive(Debug, Clone)]
pub struct RequestInfo {
    method: MethodDescriptor,
    security_level: SecurityLevel,
    authority: String,
    transport_attrs: Attributes,
}

impl RequestInfo {
    /// Describe a call.
    ///
    /// The authority is the call's override when present, otherwise the
    /// transport's default. The security level is read from the transport
    /// attributes; when the transport does not advertise one it is
    /// [`SecurityLevel::None`].
    pub fn build(
        method: &MethodDescriptor,
        options: &CallOptions,
        default_authority: &str,
        transport_attrs: Attributes,
    ) -> Self {
        let authority = options
            .authority()
            .unwrap_or(default_authority)
            .to_string();
        let security_level = transport_attrs
            .get(&ATTR_SECURITY_LEVEL)
            .unwrap_or_default();

        Self {
            method: method.clone(),
            security_level,
            authority,
            transport_attrs,
        }
    }

    /// The method being called.
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    /// The negotiated security level of the transport.
    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// The authority the call is addressed to.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The transport's attributes.
    pub fn transport_attrs(&self) -> &Attributes {
        &self.transport_attrs
    }
}
