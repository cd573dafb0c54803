//! Host-supplied callback contracts.
//!
//! The verification core never implements cryptography, JSON-LD context fetching, or DID
//! resolution itself; all of it is injected by the host through these traits, the same way
//! `actix-web-lab`'s `RequestSignatureScheme` leaves signing/verification to the implementor.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::ZcapResult,
    model::{Capability, ControllerSet, Proof},
    request::CoreRequest,
};

/// A JSON-LD document resolved by the host's document loader.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document_url: String,
    pub document: Value,
}

/// Resolves JSON-LD contexts, DID documents, and capability documents.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load_document(&self, url: &str) -> ZcapResult<LoadedDocument>;
}

/// A verification method (public key) document, dereferenced via a `DocumentLoader`.
#[derive(Debug, Clone)]
pub struct VerificationMethod {
    pub id: String,
    pub controller: String,
    pub document: Value,
}

/// Bytes-in, bool-out signature check plus the verification method it was resolved from
/// -> {verifier, verificationMethod}`).
pub struct ResolvedVerifier {
    pub verification_method: VerificationMethod,
    verify_fn: Arc<dyn Fn(&[u8], &[u8]) -> bool + Send + Sync>,
}

impl ResolvedVerifier {
    pub fn new(
        verification_method: VerificationMethod,
        verify_fn: impl Fn(&[u8], &[u8]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            verification_method,
            verify_fn: Arc::new(verify_fn),
        }
    }

    pub fn verify(&self, signing_string: &[u8], signature: &[u8]) -> bool {
        (self.verify_fn)(signing_string, signature)
    }
}

impl std::fmt::Debug for ResolvedVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedVerifier")
            .field("verification_method", &self.verification_method)
            .finish_non_exhaustive()
    }
}

/// Resolves the invocation key id to a verifier.
#[async_trait]
pub trait VerifierResolver: Send + Sync {
    async fn get_verifier(
        &self,
        key_id: &str,
        loader: &dyn DocumentLoader,
    ) -> ZcapResult<ResolvedVerifier>;
}

/// Parameters passed to [`RootControllerResolver::get_root_controller`].
pub struct RootControllerRequest<'a> {
    pub request: &'a CoreRequest,
    pub root_capability_id: &'a str,
    pub root_invocation_target: &'a str,
}

/// Supplies the controller(s) of a dynamically synthesized root capability.
#[async_trait]
pub trait RootControllerResolver: Send + Sync {
    async fn get_root_controller(
        &self,
        req: RootControllerRequest<'_>,
    ) -> ZcapResult<ControllerSet>;
}

/// A single cryptographic delegation-proof suite (e.g. `Ed25519Signature2020`).
///
/// Supplied by the host; the core never implements a suite itself.
#[async_trait]
pub trait ProofSuite: Send + Sync {
    /// Suite identifier, matched against `proof.type`.
    fn id(&self) -> &str;

    /// Verifies `proof` over `capability` given the resolved `verification_method`.
    async fn verify_delegation_proof(
        &self,
        capability: &Capability,
        proof: &Proof,
        verification_method: &VerificationMethod,
    ) -> ZcapResult<bool>;
}

/// Produces the proof suite(s) acceptable for a given request.
#[async_trait]
pub trait SuiteFactory: Send + Sync {
    async fn suites(&self, request: &CoreRequest) -> ZcapResult<Vec<Arc<dyn ProofSuite>>>;
}

/// Result of an `inspectCapabilityChain` veto hook.
#[derive(Debug, Clone, Default)]
pub struct ChainInspection {
    pub valid: bool,
    pub error: Option<String>,
}

impl ChainInspection {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }
}

/// Optional hook invoked with the dereferenced chain; may veto verification.
///
/// Whether this hook should also run over the invoker's chain during delegation verification, or
/// only the to-be-revoked chain, is a host policy choice; `RevocationPipelineConfig` exposes two
/// separate inspector slots rather than forcing one callback to serve both roles.
#[async_trait]
pub trait ChainInspector: Send + Sync {
    async fn inspect(&self, chain: &[Capability]) -> ChainInspection;
}

/// No-op inspector: never vetoes a chain.
pub struct NoopChainInspector;

#[async_trait]
impl ChainInspector for NoopChainInspector {
    async fn inspect(&self, _chain: &[Capability]) -> ChainInspection {
        ChainInspection::ok()
    }
}

/// Computes the per-request expected values.
///
/// Returns a raw [`Value`] rather than a typed struct because the host callback is free to return
/// anything, including malformed data; [`crate::expected_values::resolve`]
/// performs the validation pass that turns this into a [`crate::model::ExpectedValues`] or a
/// `BadExpectedValues` error.
#[async_trait]
pub trait ExpectedValuesResolver: Send + Sync {
    async fn get_expected_values(&self, request: &CoreRequest) -> ZcapResult<Value>;
}
