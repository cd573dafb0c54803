//! Parses the `authorization` header's HTTP-Signature scheme.
//!
//! Recognizes the draft-cavage / joyent `http-signature` wire form:
//! `Signature keyId="...",algorithm="...",created=1402170695,expires=1402170699,
//! headers="(created) (expires) (request-target) host capability-invocation",signature="base64"`
//! No cryptographic work happens here; this stage only extracts and tolerates ordering/quoting.

use std::time::{Duration, SystemTime};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    error::ZcapError,
    model::ParsedSignature,
};

/// Extracts a [`ParsedSignature`] from a raw `authorization` header value.
pub struct SignatureHeaderParser;

impl SignatureHeaderParser {
    /// Parses `header_value`, the raw content of the `authorization` header.
    ///
    /// Fails with [`ZcapError::malformed_authorization`] when the header is missing, not the
    /// "Signature" scheme, or has unparseable parameters.
    pub fn parse(header_value: Option<&str>) -> Result<ParsedSignature, ZcapError> {
        let header_value = header_value
            .ok_or_else(|| ZcapError::malformed_authorization("missing \"authorization\" header"))?;

        let header_value = header_value.trim();
        let (scheme, rest) = header_value
            .split_once(char::is_whitespace)
            .ok_or_else(|| ZcapError::malformed_authorization("malformed authorization header"))?;

        if !scheme.eq_ignore_ascii_case("signature") {
            return Err(ZcapError::malformed_authorization(format!(
                "unsupported authorization scheme \"{scheme}\""
            )));
        }

        let params = parse_params(rest)
            .map_err(|e| ZcapError::malformed_authorization(format!("malformed authorization header: {e}")))?;

        let key_id = params
            .get("keyid")
            .cloned()
            .ok_or_else(|| ZcapError::malformed_authorization("missing \"keyId\" parameter"))?;

        let signature_b64 = params
            .get("signature")
            .ok_or_else(|| ZcapError::malformed_authorization("missing \"signature\" parameter"))?;
        let signature = STANDARD
            .decode(signature_b64)
            .map_err(|e| ZcapError::malformed_authorization(format!("invalid \"signature\" encoding: {e}")))?;

        let covered_headers = params
            .get("headers")
            .map(|h| h.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();

        let created = params
            .get("created")
            .map(|v| parse_unix_timestamp(v))
            .transpose()?;
        let expires = params
            .get("expires")
            .map(|v| parse_unix_timestamp(v))
            .transpose()?;

        Ok(ParsedSignature {
            key_id,
            algorithm: params.get("algorithm").cloned(),
            covered_headers,
            signature,
            created,
            expires,
        })
    }
}

fn parse_unix_timestamp(value: &str) -> Result<SystemTime, ZcapError> {
    let secs: u64 = value
        .parse()
        .map_err(|_| ZcapError::malformed_authorization(format!("invalid timestamp \"{value}\"")))?;
    Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

/// Parses the `capability-invocation` header's `capability`/`action` parameters, using
/// the same tolerant comma-separated-parameter grammar as the `authorization` header.
pub(crate) fn parse_header_params(s: &str) -> Result<std::collections::HashMap<String, String>, String> {
    parse_params(s)
}

/// Parses `key="value",key2=value2,...` tolerating quoted/unquoted values and surrounding
/// whitespace around commas, as the HTTP-Signature convention permits.
fn parse_params(s: &str) -> Result<std::collections::HashMap<String, String>, String> {
    let mut map = std::collections::HashMap::new();

    for part in split_params(s) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| format!("malformed parameter \"{part}\""))?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
        map.insert(key, value.to_owned());
    }

    Ok(map)
}

/// Splits on top-level commas, ignoring commas inside quoted values (the `headers` parameter's
/// value never itself contains a comma, but being defensive costs nothing).
fn split_params(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                let part = s[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    let tail = s[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }

    parts
}
