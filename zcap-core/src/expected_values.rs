//! Resolves and validates per-request expected values.

use serde_json::Value;

use crate::{
    error::ZcapError,
    host::ExpectedValuesResolver,
    model::{ExpectedValues, OneOrMany},
    request::CoreRequest,
};

/// Runs the host's `getExpectedValues` and validates the result.
pub async fn resolve(
    resolver: &dyn ExpectedValuesResolver,
    request: &CoreRequest,
) -> Result<ExpectedValues, ZcapError> {
    let raw = resolver.get_expected_values(request).await?;
    from_json(&raw, request)
}

/// Validates a raw JSON value as if it were returned by `getExpectedValues`. Exposed standalone so both [`resolve`] and tests can exercise the validation pass
/// directly, the way the upstream host function is dynamically typed.
pub fn from_json(raw: &Value, request: &CoreRequest) -> Result<ExpectedValues, ZcapError> {
    let obj = raw.as_object().ok_or_else(|| {
        ZcapError::bad_expected_values("\"getExpectedValues\" must return an object.")
    })?;

    let host = obj
        .get("host")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            ZcapError::bad_expected_values("\"getExpectedValues\" must return a non-empty \"host\".")
        })?
        .to_owned();

    let root_invocation_target = parse_root_invocation_target(obj.get("rootInvocationTarget"))?;

    let action = match obj.get("action").and_then(Value::as_str) {
        Some(action) => action.to_owned(),
        None => request
            .default_action()
            .ok_or_else(|| {
                ZcapError::unsupported_method(format!(
                    "no default action for HTTP method \"{}\"",
                    request.method()
                ))
            })?
            .to_owned(),
    };

    let target = match obj.get("target").and_then(Value::as_str) {
        Some(target) => {
            if !is_absolute_uri(target) {
                return Err(ZcapError::bad_expected_values(
                    "\"target\" must be an absolute URI.",
                ));
            }
            target.to_owned()
        }
        None => format!("https://{host}{}", request.path_and_query()),
    };

    Ok(ExpectedValues {
        host,
        root_invocation_target,
        action,
        target,
    })
}

fn parse_root_invocation_target(value: Option<&Value>) -> Result<OneOrMany<String>, ZcapError> {
    let value = value.ok_or_else(|| {
        ZcapError::bad_expected_values("\"getExpectedValues\" must return a \"rootInvocationTarget\".")
    })?;

    let targets: OneOrMany<String> = match value {
        Value::String(s) => OneOrMany::One(s.clone()),
        Value::Array(items) => {
            let items: Option<Vec<String>> = items
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect();
            let items = items.ok_or_else(|| {
                ZcapError::bad_expected_values("\"rootInvocationTarget\" list must contain only strings.")
            })?;
            OneOrMany::Many(items)
        }
        _ => {
            return Err(ZcapError::bad_expected_values(
                "\"rootInvocationTarget\" must be a string or a list of strings.",
            ))
        }
    };

    if targets.is_empty() {
        return Err(ZcapError::bad_expected_values(
            "\"rootInvocationTarget\" must not be an empty list.",
        ));
    }

    for target in targets.iter() {
        if !is_absolute_uri(target) {
            return Err(ZcapError::bad_expected_values(
                "every \"rootInvocationTarget\" must be an absolute URI.",
            ));
        }
    }

    Ok(targets)
}

/// Cheap absolute-URI check: a scheme followed by `://` and a non-empty authority.
pub(crate) fn is_absolute_uri(s: &str) -> bool {
    s.parse::<http::Uri>()
        .map(|uri| uri.scheme().is_some() && uri.authority().is_some())
        .unwrap_or(false)
}
