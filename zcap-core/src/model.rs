//! Core data types: capabilities, expected values, parsed signatures, and
//! verification results.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// One identifier, or an unordered set of identifiers.
///
/// Several host callbacks (`rootInvocationTarget`, `controller`) are
/// string-or-list in the wire format; we model that as a sum type instead of
/// runtime polymorphism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            OneOrMany::One(v) => std::slice::from_ref(v).iter(),
            OneOrMany::Many(v) => v.iter(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            OneOrMany::One(_) => false,
            OneOrMany::Many(v) => v.is_empty(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

impl<T: PartialEq> OneOrMany<T> {
    /// "Any member authorizes".
    pub fn contains(&self, needle: &T) -> bool {
        self.iter().any(|v| v == needle)
    }
}

/// Deduplicated, insertion-ordered set of controller identifiers.
///
/// Used both for a capability's `controller` field and for the transitive
/// controller set collected while walking a delegation chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSet(Vec<String>);

impl ControllerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(controller: impl Into<String>) -> Self {
        Self(vec![controller.into()])
    }

    pub fn from_one_or_many(v: OneOrMany<String>) -> Self {
        let mut set = Self::new();
        for c in v.into_vec() {
            set.insert(c);
        }
        set
    }

    /// Inserts `controller` if not already present; preserves first-seen order.
    pub fn insert(&mut self, controller: impl Into<String>) {
        let controller = controller.into();
        if !self.0.contains(&controller) {
            self.0.push(controller);
        }
    }

    pub fn extend(&mut self, other: &ControllerSet) {
        for c in &other.0 {
            self.insert(c.clone());
        }
    }

    pub fn contains(&self, controller: &str) -> bool {
        self.0.iter().any(|c| c == controller)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Delegation proof attached to a non-root capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    #[serde(rename = "type")]
    pub type_: String,
    pub created: String,
    #[serde(rename = "verificationMethod")]
    pub verification_method: String,
    #[serde(rename = "proofPurpose")]
    pub proof_purpose: String,
    /// Ids of every capability from the parent up to (not including) the root.
    #[serde(rename = "capabilityChain")]
    pub capability_chain: Vec<serde_json::Value>,
    /// Suite-specific signature material (e.g. `jws`, `proofValue`).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Proof {
    pub fn created_time(&self) -> Option<SystemTime> {
        parse_xsd_datetime(&self.created)
    }
}

/// A zcap document: root or delegated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    #[serde(rename = "@context", skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    pub id: String,
    #[serde(rename = "invocationTarget")]
    pub invocation_target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<OneOrMany<String>>,
    #[serde(rename = "parentCapability", skip_serializing_if = "Option::is_none")]
    pub parent_capability: Option<String>,
    #[serde(rename = "allowedAction", skip_serializing_if = "Option::is_none")]
    pub allowed_action: Option<OneOrMany<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl Capability {
    pub fn is_root(&self) -> bool {
        self.id.starts_with("urn:zcap:root:")
    }

    pub fn controllers(&self) -> ControllerSet {
        match &self.controller {
            Some(c) => ControllerSet::from_one_or_many(c.clone()),
            None => ControllerSet::new(),
        }
    }

    pub fn allows_action(&self, action: &str) -> bool {
        match &self.allowed_action {
            // absence of `allowedAction` means "any action", per common zcap convention.
            None => true,
            Some(allowed) => allowed.contains(&action.to_owned()),
        }
    }

    pub fn expires_time(&self) -> Option<SystemTime> {
        self.expires.as_deref().and_then(parse_xsd_datetime)
    }
}

/// Per-request expected values, as validated from the host's `getExpectedValues`.
#[derive(Debug, Clone)]
pub struct ExpectedValues {
    pub host: String,
    pub root_invocation_target: OneOrMany<String>,
    pub action: String,
    pub target: String,
}

impl ExpectedValues {
    /// `urn:zcap:root:<percent-encoded target>` for every expected root invocation target.
    pub fn expected_root_capability_ids(&self) -> Vec<String> {
        self.root_invocation_target
            .iter()
            .map(|target| crate::root_capability::root_capability_id(target))
            .collect()
    }
}

/// The subset of an HTTP-Signature `authorization` header needed for verification.
#[derive(Debug, Clone)]
pub struct ParsedSignature {
    pub key_id: String,
    pub algorithm: Option<String>,
    pub covered_headers: Vec<String>,
    pub signature: Vec<u8>,
    pub created: Option<SystemTime>,
    pub expires: Option<SystemTime>,
}

/// Successful invocation verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub controller: String,
    pub chain: Vec<Capability>,
    pub key_id: String,
}

/// Output of the revocation-only delegation verification stage.
#[derive(Debug, Clone)]
pub struct RevocationContext {
    pub delegator: String,
    pub chain: Vec<Capability>,
    pub chain_controllers: ControllerSet,
}

/// Parses an `xsd:dateTime` (RFC 3339) timestamp, as used throughout zcap JSON-LD documents.
pub fn parse_xsd_datetime(s: &str) -> Option<SystemTime> {
    // Minimal RFC 3339 parser: `YYYY-MM-DDTHH:MM:SSZ` (fractional seconds optional).
    // Avoids pulling in a date/time crate for a single format the suite layer already validated.
    let bytes = s.as_bytes();
    if bytes.len() < 20 || bytes[4] != b'-' || bytes[7] != b'-' || bytes[10] != b'T' {
        return None;
    }
    let year: i64 = s.get(0..4)?.parse().ok()?;
    let month: i64 = s.get(5..7)?.parse().ok()?;
    let day: i64 = s.get(8..10)?.parse().ok()?;
    let hour: i64 = s.get(11..13)?.parse().ok()?;
    let minute: i64 = s.get(14..16)?.parse().ok()?;
    let second: i64 = s.get(17..19)?.parse().ok()?;

    let days = days_from_civil(year, month, day);
    let secs = days * 86_400 + hour * 3600 + minute * 60 + second;

    if secs >= 0 {
        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64))
    } else {
        SystemTime::UNIX_EPOCH.checked_sub(Duration::from_secs((-secs) as u64))
    }
}

/// Howard Hinnant's days-from-civil algorithm (proleptic Gregorian, days since 1970-01-01).
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
