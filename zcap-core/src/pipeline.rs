//! Assembles the invocation and revocation pipelines from host-supplied callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    chain::ChainPolicy,
    clock::{Clock, SystemClock},
    delegation::DelegationVerifier,
    digest::DigestVerifier,
    error::{ZcapError, ZcapErrorKind},
    expected_values,
    host::{
        ChainInspector, DocumentLoader, ExpectedValuesResolver, NoopChainInspector,
        RootControllerResolver, RootControllerRequest, SuiteFactory, VerifierResolver,
    },
    invocation::InvocationVerifier,
    model::{ControllerSet, ExpectedValues, RevocationContext, VerificationResult},
    request::CoreRequest,
    root_capability::RootCapabilityLoader,
    signature_header::SignatureHeaderParser,
};

/// Dependencies needed to assemble the plain invocation pipeline.
pub struct InvocationPipelineConfig {
    pub document_loader: Arc<dyn DocumentLoader>,
    pub expected_values: Arc<dyn ExpectedValuesResolver>,
    pub root_controller: Arc<dyn RootControllerResolver>,
    pub verifier_resolver: Arc<dyn VerifierResolver>,
    pub suite_factory: Arc<dyn SuiteFactory>,
    pub inspector: Arc<dyn ChainInspector>,
    pub clock: Arc<dyn Clock>,
    pub policy: ChainPolicy,
}

impl InvocationPipelineConfig {
    pub fn new(
        document_loader: Arc<dyn DocumentLoader>,
        expected_values: Arc<dyn ExpectedValuesResolver>,
        root_controller: Arc<dyn RootControllerResolver>,
        verifier_resolver: Arc<dyn VerifierResolver>,
        suite_factory: Arc<dyn SuiteFactory>,
    ) -> Self {
        Self {
            document_loader,
            expected_values,
            root_controller,
            verifier_resolver,
            suite_factory,
            inspector: Arc::new(NoopChainInspector),
            clock: Arc::new(SystemClock),
            policy: ChainPolicy::default(),
        }
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn ChainInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// `SignatureHeaderParser → DigestVerifier → ExpectedValues resolver → InvocationVerifier`.
pub struct InvocationPipeline {
    config: InvocationPipelineConfig,
}

impl InvocationPipeline {
    pub fn new(config: InvocationPipelineConfig) -> Self {
        Self { config }
    }

    /// Runs the full invocation pipeline. `request`'s body, if present, must already be populated;
    /// the digest stage clears it when no body headers are present.
    pub async fn verify(&self, request: &mut CoreRequest) -> Result<VerificationResult, ZcapError> {
        let parsed = SignatureHeaderParser::parse(request.header("authorization"))?;
        DigestVerifier::verify(request)?;
        let expected = expected_values::resolve(self.config.expected_values.as_ref(), request).await?;
        let suites = self.config.suite_factory.suites(request).await?;

        let verifier = InvocationVerifier {
            document_loader: self.config.document_loader.as_ref(),
            root_controller: self.config.root_controller.as_ref(),
            verifier_resolver: self.config.verifier_resolver.as_ref(),
            suites: &suites,
            inspector: self.config.inspector.as_ref(),
            clock: self.config.clock.as_ref(),
            policy: &self.config.policy,
        };

        let result = verifier.verify(request, &parsed, &expected).await;
        match &result {
            Ok(r) => info!(controller = %r.controller, "zcap invocation authorized"),
            Err(e) => warn!(kind = %e.kind(), message = %e.message(), "zcap invocation rejected"),
        }
        result
    }
}

/// Dependencies needed to assemble the opinionated revocation pipeline.
pub struct RevocationPipelineConfig {
    pub document_loader: Arc<dyn DocumentLoader>,
    pub expected_host: String,
    pub root_controller: Arc<dyn RootControllerResolver>,
    pub verifier_resolver: Arc<dyn VerifierResolver>,
    pub suite_factory: Arc<dyn SuiteFactory>,
    /// Runs over the invoker's chain during the invocation stage (step 6).
    pub invocation_inspector: Arc<dyn ChainInspector>,
    /// Runs over the to-be-revoked chain during the delegation stage (step 5). Kept distinct from
    /// `invocation_inspector` since a host may want different policy for "who may invoke" versus
    /// "what may be revoked"; pass the same `Arc` for both if one callback suffices.
    pub delegation_inspector: Arc<dyn ChainInspector>,
    pub clock: Arc<dyn Clock>,
    pub policy: ChainPolicy,
}

impl RevocationPipelineConfig {
    pub fn new(
        document_loader: Arc<dyn DocumentLoader>,
        expected_host: impl Into<String>,
        root_controller: Arc<dyn RootControllerResolver>,
        verifier_resolver: Arc<dyn VerifierResolver>,
        suite_factory: Arc<dyn SuiteFactory>,
    ) -> Self {
        Self {
            document_loader,
            expected_host: expected_host.into(),
            root_controller,
            verifier_resolver,
            suite_factory,
            invocation_inspector: Arc::new(NoopChainInspector),
            delegation_inspector: Arc::new(NoopChainInspector),
            clock: Arc::new(SystemClock),
            policy: ChainPolicy::default(),
        }
    }

    pub fn with_inspectors(
        mut self,
        invocation: Arc<dyn ChainInspector>,
        delegation: Arc<dyn ChainInspector>,
    ) -> Self {
        self.invocation_inspector = invocation;
        self.delegation_inspector = delegation;
        self
    }

    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Result of a successful revocation pipeline run.
pub struct RevocationOutcome {
    pub invocation: VerificationResult,
    pub revocation: RevocationContext,
}

pub struct RevocationPipeline {
    config: RevocationPipelineConfig,
}

impl RevocationPipeline {
    pub fn new(config: RevocationPipelineConfig) -> Self {
        Self { config }
    }

    /// Runs the revocation pipeline. `route_path` is the request's path (no query string), which
    /// must match `<anyPrefix>/revocations/<revocationId>`.
    pub async fn verify(
        &self,
        request: &mut CoreRequest,
        route_path: &str,
    ) -> Result<RevocationOutcome, ZcapError> {
        let (prefix, revocation_id) = parse_revocation_route(route_path).ok_or_else(|| {
            ZcapError::misconfigured(format!(
                "revocation route \"{route_path}\" does not end in /revocations/<id>"
            ))
        })?;

        let service_object_id = format!("https://{}{}", self.config.expected_host, prefix);
        let revocation_target = format!("{service_object_id}/revocations/{revocation_id}");

        let parsed = SignatureHeaderParser::parse(request.header("authorization"))?;
        DigestVerifier::verify(request)?;

        let expected = ExpectedValues {
            host: self.config.expected_host.clone(),
            root_invocation_target: crate::model::OneOrMany::Many(vec![
                service_object_id.clone(),
                revocation_target.clone(),
            ]),
            action: "write".to_owned(),
            target: format!("https://{}{route_path}", self.config.expected_host),
        };

        let body = request.body().ok_or_else(|| {
            ZcapError::invalid_delegation("The provided capability delegation is invalid.")
        })?;
        let submitted: crate::model::Capability = serde_json::from_slice(body).map_err(|e| {
            ZcapError::with_cause(
                ZcapErrorKind::InvalidDelegation,
                "The provided capability delegation is invalid.",
                e,
            )
        })?;

        let suites = self.config.suite_factory.suites(request).await?;

        let root_loader =
            RootCapabilityLoader::new(self.config.document_loader.as_ref(), self.config.root_controller.as_ref(), request);

        let delegation_verifier = DelegationVerifier {
            document_loader: &root_loader,
            suites: &suites,
            inspector: self.config.delegation_inspector.as_ref(),
            clock: self.config.clock.as_ref(),
            policy: &self.config.policy,
        };

        // No root id filter here: the to-be-revoked chain may legitimately be rooted anywhere
        // the host's root controller resolves, as long as it shares the service object's
        // prefix, which is the check just below. Passing a single exact expected root id would
        // make that prefix check unreachable, since the walk could never land anywhere else.
        let revocation = delegation_verifier.verify(&submitted, &[]).await?;

        let submitted_root_target = &revocation
            .chain
            .first()
            .expect("verified chain is never empty")
            .invocation_target;
        let service_object_prefix = format!("{service_object_id}/");
        if submitted_root_target != &service_object_id
            && !submitted_root_target.starts_with(service_object_prefix.as_str())
        {
            return Err(ZcapError::unrelated_service_object(format!(
                "submitted delegation's root invocation target {submitted_root_target} is unrelated to {service_object_id}"
            )));
        }

        let wrapped_root_controller = WrappedRootController {
            host: self.config.root_controller.clone(),
            service_object_id: service_object_id.clone(),
            revocation_target: revocation_target.clone(),
            chain_controllers: revocation.chain_controllers.clone(),
        };

        let invocation_verifier = InvocationVerifier {
            document_loader: self.config.document_loader.as_ref(),
            root_controller: &wrapped_root_controller,
            verifier_resolver: self.config.verifier_resolver.as_ref(),
            suites: &suites,
            inspector: self.config.invocation_inspector.as_ref(),
            clock: self.config.clock.as_ref(),
            policy: &self.config.policy,
        };

        let invocation = invocation_verifier.verify(request, &parsed, &expected).await?;

        Ok(RevocationOutcome {
            invocation,
            revocation,
        })
    }
}

/// Delegates to the host's resolver for the service-level root, and to the to-be-revoked chain's
/// transitive controller set for the revocation-specific root.
struct WrappedRootController {
    host: Arc<dyn RootControllerResolver>,
    service_object_id: String,
    revocation_target: String,
    chain_controllers: ControllerSet,
}

#[async_trait]
impl RootControllerResolver for WrappedRootController {
    async fn get_root_controller(
        &self,
        req: RootControllerRequest<'_>,
    ) -> Result<ControllerSet, ZcapError> {
        if req.root_invocation_target == self.service_object_id.as_str() {
            self.host.get_root_controller(req).await
        } else if req.root_invocation_target == self.revocation_target.as_str() {
            Ok(self.chain_controllers.clone())
        } else {
            Err(ZcapError::misconfigured(format!(
                "unexpected root invocation target {} in revocation pipeline",
                req.root_invocation_target
            )))
        }
    }
}

/// Matches `<anyPrefix>/revocations/<revocationId>`, returning `(prefix, revocationId)`.
fn parse_revocation_route(path: &str) -> Option<(String, String)> {
    let (prefix, id) = path.rsplit_once("/revocations/")?;
    if id.is_empty() {
        return None;
    }
    Some((prefix.to_owned(), id.to_owned()))
}
