//! Verifies a submitted zcap delegation document for the revocation endpoint.

use std::sync::Arc;

use crate::{
    chain::{self, ChainPolicy},
    clock::Clock,
    error::{ZcapError, ZcapErrorKind},
    host::{ChainInspector, DocumentLoader, ProofSuite},
    model::{Capability, RevocationContext},
};

pub struct DelegationVerifier<'a> {
    pub document_loader: &'a dyn DocumentLoader,
    pub suites: &'a [Arc<dyn ProofSuite>],
    pub inspector: &'a dyn ChainInspector,
    pub clock: &'a dyn Clock,
    pub policy: &'a ChainPolicy,
}

impl<'a> DelegationVerifier<'a> {
    /// Verifies that `capability` is a well-formed, signed delegation rooted in one of
    /// `expected_root_ids`.
    pub async fn verify(
        &self,
        capability: &Capability,
        expected_root_ids: &[String],
    ) -> Result<RevocationContext, ZcapError> {
        if capability.is_root() {
            return Err(ZcapError::root_not_revocable(
                "A root capability cannot be revoked.",
            ));
        }

        let walk = chain::walk_chain(
            capability,
            self.document_loader,
            self.suites,
            expected_root_ids,
            self.clock,
            self.policy,
            self.inspector,
            ZcapErrorKind::InvalidDelegation,
        )
        .await
        .map_err(|_| {
            ZcapError::invalid_delegation("The provided capability delegation is invalid.")
        })?;

        Ok(RevocationContext {
            delegator: walk.delegator,
            chain: walk.chain,
            chain_controllers: walk.controllers,
        })
    }
}
