//! Credentials that attach fixed metadata.

use std::sync::Arc;

use credgate_core::Executor;

use super::{CallCredentials, MetadataApplier, RequestInfo};
use crate::error::Result;
use crate::grpc::{GrpcMetadata, GrpcStatus, SecurityLevel};

/// Attaches the same metadata to every call.
///
/// Optionally refuses to send it over transports below a minimum security
/// level, which keeps bearer tokens off plaintext connections.
#[derive(Debug, Clone)]
pub struct StaticCallCredentials {
    metadata: GrpcMetadata,
    minimum_security: SecurityLevel,
}

impl StaticCallCredentials {
    /// Attach `metadata` to every call.
    pub fn new(metadata: GrpcMetadata) -> Self {
        Self {
            metadata,
            minimum_security: SecurityLevel::None,
        }
    }

    /// Attach an `authorization: Bearer <token>` header, and only over
    /// transports with privacy and integrity.
    pub fn bearer(token: &str) -> Result<Self> {
        let mut metadata = GrpcMetadata::new();
        metadata.insert("authorization", &format!("Bearer {token}"))?;
        Ok(Self::new(metadata).require_security(SecurityLevel::PrivacyAndIntegrity))
    }

    /// Reject calls on transports below `level`.
    pub fn require_security(mut self, level: SecurityLevel) -> Self {
        self.minimum_security = level;
        self
    }
}

impl CallCredentials for StaticCallCredentials {
    fn apply_request_metadata(
        &self,
        info: &RequestInfo,
        _executor: Arc<dyn Executor>,
        applier: MetadataApplier,
    ) {
        if info.security_level() < self.minimum_security {
            applier.fail(GrpcStatus::unauthenticated(format!(
                "Credentials require security level {:?} but the transport only provides {:?}",
                self.minimum_security,
                info.security_level()
            )));
            return;
        }
        applier.apply(self.metadata.clone());
    }
}
