//! Verifies an HTTP-Signature invocation and its capability's delegation chain.

use std::{sync::Arc, time::SystemTime};

use tracing::{trace, warn};

use crate::{
    chain::{self, ChainPolicy},
    clock::Clock,
    error::{ZcapError, ZcapErrorKind},
    host::{
        ChainInspector, DocumentLoader, ProofSuite, RootControllerResolver, VerifierResolver,
    },
    model::{ExpectedValues, ParsedSignature, VerificationResult},
    request::CoreRequest,
    root_capability::RootCapabilityLoader,
    signature_header::parse_header_params,
};

/// Headers that must be covered by every invocation signature; `content-type`
/// and `digest` are additionally required whenever the request carries a body.
const REQUIRED_COVERED_HEADERS: &[&str] = &[
    "(created)",
    "(expires)",
    "(request-target)",
    "host",
    "capability-invocation",
];

pub struct InvocationVerifier<'a> {
    pub document_loader: &'a dyn DocumentLoader,
    pub root_controller: &'a dyn RootControllerResolver,
    pub verifier_resolver: &'a dyn VerifierResolver,
    pub suites: &'a [Arc<dyn ProofSuite>],
    pub inspector: &'a dyn ChainInspector,
    pub clock: &'a dyn Clock,
    pub policy: &'a ChainPolicy,
}

impl<'a> InvocationVerifier<'a> {
    pub async fn verify(
        &self,
        request: &CoreRequest,
        parsed: &ParsedSignature,
        expected: &ExpectedValues,
    ) -> Result<VerificationResult, ZcapError> {
        let fail = |msg: String| ZcapError::new(ZcapErrorKind::NotAuthorized, msg);

        for required in REQUIRED_COVERED_HEADERS {
            if !parsed.covered_headers.iter().any(|h| h == required) {
                return Err(fail(format!("signature does not cover required header \"{required}\"")));
            }
        }
        if request.body().is_some() {
            for required in ["content-type", "digest"] {
                if !parsed.covered_headers.iter().any(|h| h == required) {
                    return Err(fail(format!(
                        "signature does not cover required header \"{required}\" because a body is present"
                    )));
                }
            }
        }

        let created = parsed
            .created
            .ok_or_else(|| fail("invocation signature is missing \"created\"".into()))?;
        let expires = parsed
            .expires
            .ok_or_else(|| fail("invocation signature is missing \"expires\"".into()))?;
        self.check_invocation_clock_bounds(created, expires, &fail)?;

        let signing_string = build_signing_string(request, parsed)?;

        let root_loader = RootCapabilityLoader::new(self.document_loader, self.root_controller, request);

        let resolved = self
            .verifier_resolver
            .get_verifier(&parsed.key_id, &root_loader)
            .await?;

        if !resolved.verify(signing_string.as_bytes(), &parsed.signature) {
            return Err(fail("invocation signature did not verify".into()));
        }

        let capability_invocation_header = request
            .header("capability-invocation")
            .ok_or_else(|| fail("missing \"capability-invocation\" header".into()))?;
        let invocation_params = parse_header_params(capability_invocation_header)
            .map_err(|e| fail(format!("malformed \"capability-invocation\" header: {e}")))?;
        let capability_id = invocation_params
            .get("capability")
            .ok_or_else(|| fail("\"capability-invocation\" header has no \"capability\" parameter".into()))?;

        let invoked = chain::load_capability(&root_loader, capability_id).await?;

        let expected_root_ids = expected.expected_root_capability_ids();
        let walk = chain::walk_chain(
            &invoked,
            &root_loader,
            self.suites,
            &expected_root_ids,
            self.clock,
            self.policy,
            self.inspector,
            ZcapErrorKind::NotAuthorized,
        )
        .await?;

        let signer_controller = if !resolved.verification_method.controller.is_empty() {
            resolved.verification_method.controller.clone()
        } else {
            parsed
                .key_id
                .split('#')
                .next()
                .unwrap_or(&parsed.key_id)
                .to_owned()
        };

        if !invoked.controllers().contains(&signer_controller) {
            return Err(fail(
                "signing key's controller does not match the invoked capability's controller".into(),
            ));
        }

        if !invoked.allows_action(&expected.action) {
            return Err(fail(format!(
                "invoked capability does not grant action \"{}\"",
                expected.action
            )));
        }

        let target_ok = invoked.invocation_target == expected.target
            || (self.policy.allow_target_attenuation && expected.target.starts_with(&invoked.invocation_target));
        if !target_ok {
            return Err(fail(format!(
                "invoked capability target {} does not match expected target {}",
                invoked.invocation_target, expected.target
            )));
        }

        trace!(controller = %signer_controller, key_id = %parsed.key_id, "invocation verified");

        Ok(VerificationResult {
            controller: signer_controller,
            chain: walk.chain,
            key_id: parsed.key_id.clone(),
        })
    }

    fn check_invocation_clock_bounds(
        &self,
        created: SystemTime,
        expires: SystemTime,
        fail: &impl Fn(String) -> ZcapError,
    ) -> Result<(), ZcapError> {
        let now = self.clock.now();
        let skew = self.policy.max_clock_skew;

        if created > now + skew {
            warn!("invocation signature created too far in the future");
            return Err(fail("invocation signature was created too far in the future".into()));
        }
        if expires + skew < now {
            warn!("invocation signature has expired");
            return Err(fail("invocation signature has expired".into()));
        }
        if expires < created {
            return Err(fail("invocation signature expires before it was created".into()));
        }

        Ok(())
    }
}

/// Builds the canonical signing string covering exactly the headers the signer claims to have
/// signed, in the order given.
fn build_signing_string(request: &CoreRequest, parsed: &ParsedSignature) -> Result<String, ZcapError> {
    let fail = |msg: String| ZcapError::new(ZcapErrorKind::NotAuthorized, msg);
    let mut lines = Vec::with_capacity(parsed.covered_headers.len());

    for header in &parsed.covered_headers {
        let line = match header.as_str() {
            "(request-target)" => format!(
                "(request-target): {} {}",
                request.method().as_str().to_ascii_lowercase(),
                request.path_and_query()
            ),
            "(created)" => {
                let created = parsed
                    .created
                    .ok_or_else(|| fail("signature covers \"(created)\" but has none".into()))?;
                format!("(created): {}", unix_timestamp(created))
            }
            "(expires)" => {
                let expires = parsed
                    .expires
                    .ok_or_else(|| fail("signature covers \"(expires)\" but has none".into()))?;
                format!("(expires): {}", unix_timestamp(expires))
            }
            name => {
                let value = request
                    .header(name)
                    .ok_or_else(|| fail(format!("signature covers header \"{name}\" which is absent")))?;
                format!("{name}: {value}")
            }
        };
        lines.push(line);
    }

    Ok(lines.join("\n"))
}

fn unix_timestamp(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_secs()
}
