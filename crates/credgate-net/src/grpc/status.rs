//! gRPC status codes and call outcomes.

use std::fmt;

/// gRPC status codes.
///
/// These correspond to the canonical status codes of the gRPC protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum GrpcStatusCode {
    /// The operation completed successfully.
    Ok = 0,
    /// The operation was cancelled (typically by the caller).
    Cancelled = 1,
    /// Unknown error.
    Unknown = 2,
    /// Invalid argument was provided.
    InvalidArgument = 3,
    /// Deadline expired before operation could complete.
    DeadlineExceeded = 4,
    /// Requested entity was not found.
    NotFound = 5,
    /// Entity already exists.
    AlreadyExists = 6,
    /// Permission denied.
    PermissionDenied = 7,
    /// Resource exhausted (e.g., rate limit exceeded).
    ResourceExhausted = 8,
    /// Precondition failed.
    FailedPrecondition = 9,
    /// Operation was aborted.
    Aborted = 10,
    /// Operation was out of valid range.
    OutOfRange = 11,
    /// Operation is not implemented.
    Unimplemented = 12,
    /// Internal error.
    Internal = 13,
    /// Service is unavailable.
    Unavailable = 14,
    /// Data loss occurred.
    DataLoss = 15,
    /// The request does not have valid authentication credentials.
    Unauthenticated = 16,
}

impl GrpcStatusCode {
    /// Every code, indexed by its wire value.
    pub const ALL: [GrpcStatusCode; 17] = [
        Self::Ok,
        Self::Cancelled,
        Self::Unknown,
        Self::InvalidArgument,
        Self::DeadlineExceeded,
        Self::NotFound,
        Self::AlreadyExists,
        Self::PermissionDenied,
        Self::ResourceExhausted,
        Self::FailedPrecondition,
        Self::Aborted,
        Self::OutOfRange,
        Self::Unimplemented,
        Self::Internal,
        Self::Unavailable,
        Self::DataLoss,
        Self::Unauthenticated,
    ];

    /// Create from a wire value. Out-of-range values map to `Unknown`.
    pub fn from_i32(code: i32) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .unwrap_or(Self::Unknown)
    }

    /// Get the wire value of this code.
    pub fn to_i32(self) -> i32 {
        self as i32
    }

    /// Check if this is an OK status.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Get the canonical upper-snake name of the status code.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for GrpcStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<tonic::Code> for GrpcStatusCode {
    fn from(code: tonic::Code) -> Self {
        Self::from_i32(code as i32)
    }
}

impl From<GrpcStatusCode> for tonic::Code {
    fn from(code: GrpcStatusCode) -> Self {
        tonic::Code::from_i32(code.to_i32())
    }
}

/// The outcome of an RPC, as observed by a stream listener.
///
/// `cause` carries a diagnostic for the underlying fault (for example the
/// payload of a panicking credential) and is kept apart from the
/// server-facing description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcStatus {
    /// The status code.
    pub code: GrpcStatusCode,
    /// A human-readable description, possibly empty.
    pub message: String,
    /// The underlying cause, if any.
    pub cause: Option<String>,
}

impl GrpcStatus {
    /// Create a new status.
    pub fn new(code: GrpcStatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// Create an OK status.
    pub fn ok() -> Self {
        Self::new(GrpcStatusCode::Ok, "")
    }

    /// Create a cancelled status.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(GrpcStatusCode::Cancelled, message)
    }

    /// Create a permission denied status.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(GrpcStatusCode::PermissionDenied, message)
    }

    /// Create an internal error status.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(GrpcStatusCode::Internal, message)
    }

    /// Create an unavailable status.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(GrpcStatusCode::Unavailable, message)
    }

    /// Create an unauthenticated status.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(GrpcStatusCode::Unauthenticated, message)
    }

    /// Attach the underlying cause.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Check if this is an OK status.
    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

impl fmt::Display for GrpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)?;
        } else {
            write!(f, "{}: {}", self.code, self.message)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for GrpcStatus {}

impl From<tonic::Status> for GrpcStatus {
    fn from(status: tonic::Status) -> Self {
        Self::new(status.code().into(), status.message())
    }
}

impl From<GrpcStatus> for tonic::Status {
    fn from(status: GrpcStatus) -> Self {
        tonic::Status::new(status.code.into(), status.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_from_i32() {
        assert_eq!(GrpcStatusCode::from_i32(0), GrpcStatusCode::Ok);
        assert_eq!(GrpcStatusCode::from_i32(16), GrpcStatusCode::Unauthenticated);
        assert_eq!(GrpcStatusCode::from_i32(100), GrpcStatusCode::Unknown);
        assert_eq!(GrpcStatusCode::from_i32(-1), GrpcStatusCode::Unknown);
    }

    #[test]
    fn test_status_code_table_matches_discriminants() {
        for (index, code) in GrpcStatusCode::ALL.iter().enumerate() {
            assert_eq!(code.to_i32(), index as i32);
        }
    }

    #[test]
    fn test_status_creation() {
        let status = GrpcStatus::unauthenticated("token expired");
        assert_eq!(status.code, GrpcStatusCode::Unauthenticated);
        assert_eq!(status.message, "token expired");
        assert!(!status.is_ok());
        assert!(GrpcStatus::ok().is_ok());
    }

    #[test]
    fn test_status_display() {
        let status = GrpcStatus::internal("Something went wrong");
        assert_eq!(status.to_string(), "INTERNAL: Something went wrong");

        let status = GrpcStatus::unauthenticated("bad").with_cause("boom");
        assert_eq!(status.to_string(), "UNAUTHENTICATED: bad (caused by: boom)");
    }

    #[test]
    fn test_tonic_conversion() {
        let status: tonic::Status = GrpcStatus::unauthenticated("nope").into();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert_eq!(status.message(), "nope");

        let back = GrpcStatus::from(status);
        assert_eq!(back.code, GrpcStatusCode::Unauthenticated);
    }
}
