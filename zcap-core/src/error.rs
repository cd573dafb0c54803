//! Error taxonomy and HTTP status mapping.

use derive_more::Display;

/// Classifies the cause of a pipeline failure; used by framework adapters to pick an HTTP status
/// and by callers/tests to assert on *why* a request was rejected without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[non_exhaustive]
pub enum ZcapErrorKind {
    MalformedAuthorization,
    MissingDigest,
    DigestMismatch,
    BadExpectedValues,
    UnsupportedMethod,
    RootNotRevocable,
    InvalidDelegation,
    UnrelatedServiceObject,
    NotAuthorized,
    Misconfigured,
}

impl ZcapErrorKind {
    /// Status code a host should answer with.
    pub fn status_code(self) -> u16 {
        use ZcapErrorKind::*;
        match self {
            MalformedAuthorization => 400,
            MissingDigest => 400,
            DigestMismatch => 400,
            BadExpectedValues => 500,
            UnsupportedMethod => 400,
            RootNotRevocable => 400,
            InvalidDelegation => 400,
            UnrelatedServiceObject => 403,
            NotAuthorized => 403,
            Misconfigured => 500,
        }
    }

    /// Short machine-readable name for this kind alone (`DataError`, `NotAllowedError`, and
    /// `NotAuthorized` are exposed by [`ZcapError::name`] instead, since multiple kinds share the
    /// same wire name).
    pub fn as_str(self) -> &'static str {
        use ZcapErrorKind::*;
        match self {
            MalformedAuthorization => "MalformedAuthorization",
            MissingDigest => "MissingDigest",
            DigestMismatch => "DigestMismatch",
            BadExpectedValues => "BadExpectedValues",
            UnsupportedMethod => "UnsupportedMethod",
            RootNotRevocable => "RootNotRevocable",
            InvalidDelegation => "InvalidDelegation",
            UnrelatedServiceObject => "UnrelatedServiceObject",
            NotAuthorized => "NotAuthorized",
            Misconfigured => "Misconfigured",
        }
    }
}

/// A typed pipeline failure. Carries a human-readable `message` and an optional `cause` wrapping
/// the triggering error.
#[derive(Debug, Display)]
#[display("{kind}: {message}")]
pub struct ZcapError {
    kind: ZcapErrorKind,
    message: String,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ZcapError {
    pub fn new(kind: ZcapErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        kind: ZcapErrorKind,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn kind(&self) -> ZcapErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Wire-level error name, matching the `DataError`/`NotAllowedError` vocabulary used by the
    /// seed tests alongside the finer-grained [`ZcapErrorKind`].
    pub fn name(&self) -> &'static str {
        use ZcapErrorKind::*;
        match self.kind {
            MissingDigest | DigestMismatch | InvalidDelegation | BadExpectedValues => "DataError",
            RootNotRevocable => "NotAllowedError",
            MalformedAuthorization | UnsupportedMethod => "DataError",
            UnrelatedServiceObject | NotAuthorized => "NotAllowedError",
            Misconfigured => "Error",
        }
    }

    /// Body shape published on failure.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "name": self.name(), "message": self.message })
    }
}

impl std::error::Error for ZcapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

macro_rules! kind_ctor {
    ($fn_name:ident, $kind:ident) => {
        impl ZcapError {
            pub fn $fn_name(message: impl Into<String>) -> Self {
                Self::new(ZcapErrorKind::$kind, message)
            }
        }
    };
}

kind_ctor!(malformed_authorization, MalformedAuthorization);
kind_ctor!(missing_digest, MissingDigest);
kind_ctor!(digest_mismatch, DigestMismatch);
kind_ctor!(bad_expected_values, BadExpectedValues);
kind_ctor!(unsupported_method, UnsupportedMethod);
kind_ctor!(root_not_revocable, RootNotRevocable);
kind_ctor!(invalid_delegation, InvalidDelegation);
kind_ctor!(unrelated_service_object, UnrelatedServiceObject);
kind_ctor!(not_authorized, NotAuthorized);
kind_ctor!(misconfigured, Misconfigured);

pub type ZcapResult<T> = Result<T, ZcapError>;
