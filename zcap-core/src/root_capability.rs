//! Root capability id synthesis and the loader wrapper that materializes root capability
//! documents on demand.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::{
    error::ZcapError,
    host::{DocumentLoader, LoadedDocument, RootControllerRequest, RootControllerResolver},
    model::{Capability, ControllerSet},
    request::CoreRequest,
};

const ROOT_PREFIX: &str = "urn:zcap:root:";

/// Characters that must be percent-encoded inside the `urn:zcap:root:` suffix.
///
/// URNs forbid raw `/`, `?`, `#`, and friends in the namespace-specific-string once encoded as an
/// opaque segment, so we are deliberately conservative and match the `encodeURIComponent` set used
/// upstream rather than the narrower RFC 3986 `path` set.
const ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'=')
    .add(b'&')
    .add(b'+')
    .add(b',');

/// `urn:zcap:root:<percent-encoded absolute-URI>`.
pub fn root_capability_id(invocation_target: &str) -> String {
    format!(
        "{ROOT_PREFIX}{}",
        utf8_percent_encode(invocation_target, ENCODE_SET)
    )
}

/// Recovers the invocation target from a root capability id, or `None` if `id` is not a root id.
pub fn invocation_target_from_root_id(id: &str) -> Option<String> {
    let suffix = id.strip_prefix(ROOT_PREFIX)?;
    percent_decode_str(suffix).decode_utf8().ok().map(|s| s.into_owned())
}

pub fn is_root_capability_id(id: &str) -> bool {
    id.starts_with(ROOT_PREFIX)
}

/// Synthesizes root capability documents on demand, delegating everything else to a base
/// `DocumentLoader`. Synthesized documents are never cached across requests: a new
/// `RootCapabilityLoader` is built per request and dropped with it.
pub struct RootCapabilityLoader<'a> {
    base: &'a dyn DocumentLoader,
    root_controller: &'a dyn RootControllerResolver,
    request: &'a CoreRequest,
}

impl<'a> RootCapabilityLoader<'a> {
    pub fn new(
        base: &'a dyn DocumentLoader,
        root_controller: &'a dyn RootControllerResolver,
        request: &'a CoreRequest,
    ) -> Self {
        Self {
            base,
            root_controller,
            request,
        }
    }

    pub async fn load_capability(&self, url: &str) -> Result<Capability, ZcapError> {
        if let Some(invocation_target) = invocation_target_from_root_id(url) {
            let controller = self
                .root_controller
                .get_root_controller(RootControllerRequest {
                    request: self.request,
                    root_capability_id: url,
                    root_invocation_target: &invocation_target,
                })
                .await?;

            return Ok(synthesize_root_capability(url, &invocation_target, controller));
        }

        let loaded = self.base.load_document(url).await?;
        serde_json::from_value(loaded.document).map_err(|e| {
            ZcapError::with_cause(
                crate::error::ZcapErrorKind::NotAuthorized,
                format!("capability document at {url} is not a valid capability"),
                e,
            )
        })
    }
}

#[async_trait::async_trait]
impl DocumentLoader for RootCapabilityLoader<'_> {
    async fn load_document(&self, url: &str) -> Result<LoadedDocument, ZcapError> {
        if let Some(invocation_target) = invocation_target_from_root_id(url) {
            let controller = self
                .root_controller
                .get_root_controller(RootControllerRequest {
                    request: self.request,
                    root_capability_id: url,
                    root_invocation_target: &invocation_target,
                })
                .await?;

            let capability = synthesize_root_capability(url, &invocation_target, controller);
            return Ok(LoadedDocument {
                document_url: url.to_owned(),
                document: serde_json::to_value(capability).expect("capability always serializes"),
            });
        }

        self.base.load_document(url).await
    }
}

fn synthesize_root_capability(
    id: &str,
    invocation_target: &str,
    controller: ControllerSet,
) -> Capability {
    Capability {
        context: Some(serde_json::json!(["https://w3id.org/security/v2"])),
        id: id.to_owned(),
        invocation_target: invocation_target.to_owned(),
        controller: if controller.is_empty() {
            None
        } else {
            Some(crate::model::OneOrMany::Many(controller.into_vec()))
        },
        parent_capability: None,
        allowed_action: None,
        expires: None,
        proof: None,
    }
}
