//! Validates the `digest` header against received body bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest as _, Sha256, Sha512};

use crate::{error::ZcapError, request::CoreRequest};

/// Verifies the `digest` header, or clears a spuriously pre-populated body when no body is
/// indicated by request headers.
pub struct DigestVerifier;

impl DigestVerifier {
    pub fn verify(request: &mut CoreRequest) -> Result<(), ZcapError> {
        if !request.has_body_headers() {
            // server-side body parsers may set an empty body even without body headers; prevent
            // downstream code from accidentally consuming it.
            request.clear_body();
            return Ok(());
        }

        let digest_header = request
            .header("digest")
            .ok_or_else(|| {
                ZcapError::missing_digest(
                    "A \"digest\" header must be present when an HTTP body is present.",
                )
            })?
            .to_owned();

        let body = request.body().unwrap_or(&[]);

        for part in digest_header.split(',') {
            let (algorithm, expected_b64) = part
                .split_once('=')
                .map(|(a, v)| (a.trim(), v.trim()))
                .ok_or_else(|| {
                    ZcapError::missing_digest(
                        "A \"digest\" header must be present when an HTTP body is present.",
                    )
                })?;

            let actual = digest_for_algorithm(algorithm, body).ok_or_else(|| {
                ZcapError::digest_mismatch(format!(
                    "unsupported digest algorithm \"{algorithm}\""
                ))
            })?;

            if actual != expected_b64 {
                return Err(ZcapError::digest_mismatch(
                    "The \"digest\" header value does not match digest of body.",
                ));
            }
        }

        Ok(())
    }
}

fn digest_for_algorithm(algorithm: &str, body: &[u8]) -> Option<String> {
    match algorithm.to_ascii_uppercase().as_str() {
        "SHA-256" => Some(STANDARD.encode(Sha256::digest(body))),
        "SHA-512" => Some(STANDARD.encode(Sha512::digest(body))),
        _ => None,
    }
}
