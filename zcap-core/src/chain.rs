//! Shared delegation-chain walking policy, used by both the invocation and delegation
//! verification stages.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, SystemTime},
};

use tracing::{debug, trace};

use crate::{
    clock::Clock,
    error::{ZcapError, ZcapErrorKind},
    host::{ChainInspector, DocumentLoader, ProofSuite, VerificationMethod},
    model::{Capability, ControllerSet, Proof},
};

/// Attenuation, length, TTL, and clock-skew policy applied while walking a chain.
#[derive(Debug, Clone)]
pub struct ChainPolicy {
    /// Hierarchical URL attenuation vs. exact target match.
    pub allow_target_attenuation: bool,
    /// Maximum chain length, root included. Default 10.
    pub max_chain_length: usize,
    /// Maximum `created` → `expires` span for any delegation. Default 90 days.
    pub max_delegation_ttl: Duration,
    /// Tolerance applied to every timestamp comparison. Default 300s.
    pub max_clock_skew: Duration,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            allow_target_attenuation: true,
            max_chain_length: 10,
            max_delegation_ttl: Duration::from_secs(60 * 60 * 24 * 90),
            max_clock_skew: Duration::from_secs(300),
        }
    }
}

/// Result of successfully walking and verifying a chain.
pub struct ChainWalkResult {
    /// Ordered root-first, leaf-last.
    pub chain: Vec<Capability>,
    /// Transitive, deduplicated set of controllers appearing anywhere in the chain.
    pub controllers: ControllerSet,
    /// Controller that delegated the leaf capability (the signer of its proof), i.e. the last
    /// signer in the chain.
    pub delegator: String,
}

/// Loads and parses a capability document via `loader` (root or otherwise).
pub async fn load_capability(loader: &dyn DocumentLoader, url: &str) -> Result<Capability, ZcapError> {
    let loaded = loader.load_document(url).await?;
    serde_json::from_value(loaded.document).map_err(|e| {
        ZcapError::with_cause(
            ZcapErrorKind::NotAuthorized,
            format!("capability document at {url} is not a valid capability"),
            e,
        )
    })
}

async fn load_verification_method(
    loader: &dyn DocumentLoader,
    vm_id: &str,
) -> Result<VerificationMethod, ZcapError> {
    let loaded = loader.load_document(vm_id).await?;
    let controller = loaded
        .document
        .get("controller")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| {
            // some DID methods embed the controller as the key's own id up to the fragment.
            vm_id.split('#').next().unwrap_or(vm_id).to_owned()
        });

    Ok(VerificationMethod {
        id: vm_id.to_owned(),
        controller,
        document: loaded.document,
    })
}

/// Walks from `leaf` up through `parentCapability` links to a root, verifying every link's
/// delegation proof, attenuation, length, TTL, and clock-skew constraints.
///
/// `expected_root_ids` constrains which root the walk may land on; an empty slice accepts any
/// root the `loader` can resolve, leaving the caller to apply its own, more specific check
/// against the result (e.g. the revocation pipeline's root-vs-service-object prefix check).
///
/// `failure_kind` lets callers distinguish an invocation-stage failure (`NotAuthorized`) from a
/// revocation delegation-stage failure (`InvalidDelegation`) while sharing this one walk.
#[allow(clippy::too_many_arguments)]
pub async fn walk_chain(
    leaf: &Capability,
    loader: &dyn DocumentLoader,
    suites: &[Arc<dyn ProofSuite>],
    expected_root_ids: &[String],
    clock: &dyn Clock,
    policy: &ChainPolicy,
    inspector: &dyn ChainInspector,
    failure_kind: ZcapErrorKind,
) -> Result<ChainWalkResult, ZcapError> {
    let fail = |msg: String| ZcapError::new(failure_kind, msg);
    let now = clock.now();

    // Walk parent-ward, root-to-leaf order is reversed at the end.
    let mut leaf_to_root = vec![leaf.clone()];
    let mut seen_ids: HashSet<String> = [leaf.id.clone()].into_iter().collect();

    let mut current = leaf.clone();
    while !current.is_root() {
        let parent_id = current.parent_capability.clone().ok_or_else(|| {
            fail(format!(
                "capability {} is not a root and has no parentCapability",
                current.id
            ))
        })?;

        if !seen_ids.insert(parent_id.clone()) {
            return Err(fail(format!("cycle detected in delegation chain at {parent_id}")));
        }

        let parent = load_capability(loader, &parent_id).await?;
        trace!(capability = %parent.id, "loaded parent capability");
        leaf_to_root.push(parent.clone());
        current = parent;

        if leaf_to_root.len() > policy.max_chain_length {
            return Err(fail(format!(
                "delegation chain exceeds maximum length of {}",
                policy.max_chain_length
            )));
        }
    }

    if leaf_to_root.len() > policy.max_chain_length {
        return Err(fail(format!(
            "delegation chain exceeds maximum length of {}",
            policy.max_chain_length
        )));
    }

    let root = leaf_to_root.last().expect("leaf_to_root always non-empty");
    if !expected_root_ids.is_empty() && !expected_root_ids.iter().any(|id| id == &root.id) {
        return Err(fail(format!(
            "root capability {} is not one of the expected root capabilities",
            root.id
        )));
    }

    let mut chain: Vec<Capability> = leaf_to_root;
    chain.reverse(); // root-first, leaf-last

    let mut controllers = ControllerSet::new();
    for capability in &chain {
        controllers.extend(&capability.controllers());
    }

    let mut delegator = root
        .controllers()
        .into_vec()
        .into_iter()
        .next()
        .unwrap_or_default();

    // Verify every non-root link's delegation proof and attenuation, parent-to-child.
    for window in chain.windows(2) {
        let [parent, child] = window else { unreachable!() };

        let proof = child
            .proof
            .as_ref()
            .ok_or_else(|| fail(format!("capability {} has no delegation proof", child.id)))?;

        verify_target_attenuation(parent, child, policy.allow_target_attenuation, &fail)?;
        verify_delegation_ttl(child, proof, policy.max_delegation_ttl, now, policy.max_clock_skew, &fail)?;

        let suite = suites
            .iter()
            .find(|s| s.id() == proof.type_)
            .ok_or_else(|| fail(format!("no proof suite available for type \"{}\"", proof.type_)))?;

        let verification_method = load_verification_method(loader, &proof.verification_method).await?;

        if !parent.controllers().contains(&verification_method.controller) {
            return Err(fail(format!(
                "delegation proof on {} was not signed by the controller of its parent",
                child.id
            )));
        }

        let verified = suite
            .verify_delegation_proof(child, proof, &verification_method)
            .await?;
        if !verified {
            return Err(fail(format!(
                "delegation proof on {} failed cryptographic verification",
                child.id
            )));
        }

        delegator = verification_method.controller;
    }

    let inspection = inspector.inspect(&chain).await;
    if !inspection.valid {
        return Err(fail(
            inspection
                .error
                .unwrap_or_else(|| "capability chain was rejected by inspection".to_owned()),
        ));
    }

    debug!(chain_len = chain.len(), "delegation chain verified");

    Ok(ChainWalkResult {
        chain,
        controllers,
        delegator,
    })
}

fn verify_target_attenuation(
    parent: &Capability,
    child: &Capability,
    allow_attenuation: bool,
    fail: &impl Fn(String) -> ZcapError,
) -> Result<(), ZcapError> {
    let ok = if allow_attenuation {
        child.invocation_target == parent.invocation_target
            || child.invocation_target.starts_with(&parent.invocation_target)
    } else {
        child.invocation_target == parent.invocation_target
    };

    if ok {
        Ok(())
    } else {
        Err(fail(format!(
            "invocation target {} is not attenuated from parent target {}",
            child.invocation_target, parent.invocation_target
        )))
    }
}

fn verify_delegation_ttl(
    child: &Capability,
    proof: &Proof,
    max_ttl: Duration,
    now: SystemTime,
    max_clock_skew: Duration,
    fail: &impl Fn(String) -> ZcapError,
) -> Result<(), ZcapError> {
    let created = proof
        .created_time()
        .ok_or_else(|| fail(format!("delegation proof on {} has no valid \"created\"", child.id)))?;
    let expires = child
        .expires_time()
        .ok_or_else(|| fail(format!("delegated capability {} has no \"expires\"", child.id)))?;

    let span = expires
        .duration_since(created)
        .map_err(|_| fail(format!("delegated capability {} expires before it was created", child.id)))?;

    if span > max_ttl {
        return Err(fail(format!(
            "delegated capability {} TTL of {:?} exceeds maximum of {:?}",
            child.id, span, max_ttl
        )));
    }

    if expires + max_clock_skew < now {
        return Err(fail(format!("delegated capability {} has expired", child.id)));
    }

    if created > now + max_clock_skew {
        return Err(fail(format!(
            "delegation proof on {} was created too far in the future",
            child.id
        )));
    }

    Ok(())
}
