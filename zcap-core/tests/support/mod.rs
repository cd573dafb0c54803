//! Shared fixtures for the end-to-end integration tests: an in-memory document loader, an
//! Ed25519-backed proof suite and verifier resolver, and the HTTP-Signature string building the
//! production code does internally, reimplemented here so tests can construct real signed
//! requests instead of stubbing the crypto layer out.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde_json::{json, Value};
use sha2::{Digest as _, Sha256};

use zcap_core::{
    error::{ZcapError, ZcapErrorKind, ZcapResult},
    host::{
        DocumentLoader, ExpectedValuesResolver, LoadedDocument, ProofSuite, ResolvedVerifier,
        RootControllerRequest, RootControllerResolver, SuiteFactory, VerificationMethod,
        VerifierResolver,
    },
    model::{Capability, ControllerSet, OneOrMany, Proof},
    request::CoreRequest,
};

pub const SUITE_ID: &str = "Ed25519Signature2020";

/// A signing identity registered with a [`MapLoader`] under `<did>#key-1`.
pub struct Actor {
    pub did: String,
    pub key_id: String,
    pub signing_key: SigningKey,
}

/// Generates a fresh keypair for `did` and registers its verification method document with
/// `loader`.
pub fn new_actor(loader: &MapLoader, did: &str) -> Actor {
    let signing_key = SigningKey::generate(&mut OsRng);
    let key_id = format!("{did}#key-1");
    let public_key_b64 = STANDARD.encode(signing_key.verifying_key().to_bytes());

    loader.insert(
        key_id.clone(),
        json!({
            "id": key_id,
            "type": "Ed25519VerificationKey2020",
            "controller": did,
            "publicKeyBase64": public_key_b64,
        }),
    );

    Actor {
        did: did.to_owned(),
        key_id,
        signing_key,
    }
}

/// In-memory [`DocumentLoader`] backed by a `Mutex<HashMap>`, holding delegated-capability and
/// verification-method documents for a single test.
#[derive(Default)]
pub struct MapLoader(Mutex<HashMap<String, Value>>);

impl MapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, document: Value) {
        self.0.lock().unwrap().insert(url.into(), document);
    }
}

#[async_trait]
impl DocumentLoader for MapLoader {
    async fn load_document(&self, url: &str) -> ZcapResult<LoadedDocument> {
        self.0
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .map(|document| LoadedDocument {
                document_url: url.to_owned(),
                document,
            })
            .ok_or_else(|| ZcapError::not_authorized(format!("no document registered for {url}")))
    }
}

/// Supplies a fixed controller set for each root invocation target a test registers.
#[derive(Default)]
pub struct MapRootController(Mutex<HashMap<String, ControllerSet>>);

impl MapRootController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, invocation_target: impl Into<String>, controllers: ControllerSet) {
        self.0.lock().unwrap().insert(invocation_target.into(), controllers);
    }
}

#[async_trait]
impl RootControllerResolver for MapRootController {
    async fn get_root_controller(&self, req: RootControllerRequest<'_>) -> ZcapResult<ControllerSet> {
        self.0
            .lock()
            .unwrap()
            .get(req.root_invocation_target)
            .cloned()
            .ok_or_else(|| {
                ZcapError::misconfigured(format!(
                    "no root controller registered for {}",
                    req.root_invocation_target
                ))
            })
    }
}

/// Returns a fixed JSON value as `getExpectedValues`' result, the way a host's callback would.
pub struct FixedExpectedValues(pub Value);

#[async_trait]
impl ExpectedValuesResolver for FixedExpectedValues {
    async fn get_expected_values(&self, _request: &CoreRequest) -> ZcapResult<Value> {
        Ok(self.0.clone())
    }
}

/// Resolves an invocation `keyId` to an Ed25519 verifier via a document carrying
/// `publicKeyBase64`, the same shape [`new_actor`] registers.
pub struct MapVerifierResolver;

#[async_trait]
impl VerifierResolver for MapVerifierResolver {
    async fn get_verifier(&self, key_id: &str, loader: &dyn DocumentLoader) -> ZcapResult<ResolvedVerifier> {
        let loaded = loader.load_document(key_id).await?;
        let verifying_key = verifying_key_from_document(&loaded.document)?;
        let controller = loaded
            .document
            .get("controller")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let vm = VerificationMethod {
            id: key_id.to_owned(),
            controller,
            document: loaded.document,
        };

        Ok(ResolvedVerifier::new(vm, move |message, signature| {
            verify_ed25519(&verifying_key, message, signature)
        }))
    }
}

/// Hands out the single [`Ed25519TestSuite`] regardless of request.
pub struct Ed25519SuiteFactory;

#[async_trait]
impl SuiteFactory for Ed25519SuiteFactory {
    async fn suites(&self, _request: &CoreRequest) -> ZcapResult<Vec<Arc<dyn ProofSuite>>> {
        Ok(vec![Arc::new(Ed25519TestSuite)])
    }
}

/// Delegation proof suite backed by ed25519, signing/verifying the capability document and proof
/// options (minus `proofValue`) as one canonical JSON object.
pub struct Ed25519TestSuite;

#[async_trait]
impl ProofSuite for Ed25519TestSuite {
    fn id(&self) -> &str {
        SUITE_ID
    }

    async fn verify_delegation_proof(
        &self,
        capability: &Capability,
        proof: &Proof,
        verification_method: &VerificationMethod,
    ) -> ZcapResult<bool> {
        let verifying_key = verifying_key_from_document(&verification_method.document)?;

        let proof_value = proof
            .extra
            .get("proofValue")
            .and_then(Value::as_str)
            .ok_or_else(|| ZcapError::misconfigured("delegation proof has no \"proofValue\""))?;
        let signature_bytes = STANDARD
            .decode(proof_value)
            .map_err(|e| ZcapError::with_cause(ZcapErrorKind::Misconfigured, "invalid proofValue encoding", e))?;

        let bytes = signing_bytes(capability, proof);
        Ok(verify_ed25519(&verifying_key, &bytes, &signature_bytes))
    }
}

fn verifying_key_from_document(document: &Value) -> ZcapResult<VerifyingKey> {
    let public_key_b64 = document
        .get("publicKeyBase64")
        .and_then(Value::as_str)
        .ok_or_else(|| ZcapError::misconfigured("verification method document has no \"publicKeyBase64\""))?;
    let bytes = STANDARD
        .decode(public_key_b64)
        .map_err(|e| ZcapError::with_cause(ZcapErrorKind::Misconfigured, "invalid public key encoding", e))?;
    let array: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ZcapError::misconfigured("public key is not 32 bytes"))?;
    VerifyingKey::from_bytes(&array)
        .map_err(|e| ZcapError::with_cause(ZcapErrorKind::Misconfigured, "malformed public key", e))
}

fn verify_ed25519(verifying_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> bool {
    let Ok(array) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    verifying_key.verify(message, &Signature::from_bytes(&array)).is_ok()
}

/// Canonicalizes `capability` (without its own proof) and `proof` (without `proofValue`) into the
/// bytes a delegation proof signs over. Relies on `serde_json::Map`'s default `BTreeMap` backing
/// for deterministic key order.
fn signing_bytes(capability: &Capability, proof: &Proof) -> Vec<u8> {
    let mut document = capability.clone();
    document.proof = None;

    let mut proof_options = proof.clone();
    proof_options.extra.remove("proofValue");

    let combined = json!({ "document": document, "proofOptions": proof_options });
    serde_json::to_vec(&combined).expect("capability and proof always serialize")
}

/// Builds and signs a delegation proof over `capability`, attaching it in place.
pub fn sign_delegation(capability: &mut Capability, signer: &SigningKey, verification_method_id: &str, created: &str) {
    capability.proof = Some(Proof {
        type_: SUITE_ID.to_owned(),
        created: created.to_owned(),
        verification_method: verification_method_id.to_owned(),
        proof_purpose: "capabilityDelegation".to_owned(),
        capability_chain: Vec::new(),
        extra: serde_json::Map::new(),
    });

    let bytes = signing_bytes(capability, capability.proof.as_ref().expect("just set"));
    let signature = signer.sign(&bytes);
    let proof_value = STANDARD.encode(signature.to_bytes());

    capability
        .proof
        .as_mut()
        .expect("just set")
        .extra
        .insert("proofValue".to_owned(), Value::String(proof_value));
}

/// A capability with a single string controller and no action restriction, the common case in
/// these fixtures.
pub fn capability(
    id: &str,
    invocation_target: &str,
    controller: &str,
    parent_capability: Option<&str>,
    expires: Option<&str>,
) -> Capability {
    Capability {
        context: None,
        id: id.to_owned(),
        invocation_target: invocation_target.to_owned(),
        controller: Some(OneOrMany::One(controller.to_owned())),
        parent_capability: parent_capability.map(str::to_owned),
        allowed_action: None,
        expires: expires.map(str::to_owned),
        proof: None,
    }
}

/// Builds the canonical HTTP-Signature signing string the way the invocation stage does,
/// covering exactly `covered` in order.
pub fn build_signing_string(request: &CoreRequest, covered: &[&str], created: SystemTime, expires: SystemTime) -> String {
    covered
        .iter()
        .map(|header| match *header {
            "(request-target)" => format!(
                "(request-target): {} {}",
                request.method().as_str().to_ascii_lowercase(),
                request.path_and_query()
            ),
            "(created)" => format!("(created): {}", unix_timestamp(created)),
            "(expires)" => format!("(expires): {}", unix_timestamp(expires)),
            name => format!(
                "{name}: {}",
                request.header(name).expect("test fixture must set every covered header")
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Signs `request` with `signer` and returns the `authorization` header value a real client
/// would send.
pub fn authorization_header(
    key_id: &str,
    signer: &SigningKey,
    request: &CoreRequest,
    covered: &[&str],
    created: SystemTime,
    expires: SystemTime,
) -> String {
    let signing_string = build_signing_string(request, covered, created, expires);
    let signature = signer.sign(signing_string.as_bytes());
    let signature_b64 = STANDARD.encode(signature.to_bytes());

    format!(
        "Signature keyId=\"{key_id}\",algorithm=\"ed25519\",created={},expires={},headers=\"{}\",signature=\"{signature_b64}\"",
        unix_timestamp(created),
        unix_timestamp(expires),
        covered.join(" "),
    )
}

pub fn digest_header(body: &[u8]) -> String {
    format!("SHA-256={}", STANDARD.encode(Sha256::digest(body)))
}

fn unix_timestamp(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_secs()
}
