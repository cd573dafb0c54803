//! Framework-agnostic verification core for Authorization Capability (zcap) invocations over
//! signed HTTP requests.
//!
//! # What Is This Crate?
//! This crate answers one question for a host HTTP framework: given an incoming request, is it
//! authorized by a valid zcap invocation? A companion question, answered only by the
//! [`pipeline::RevocationPipeline`], is: may a submitted zcap delegation be accepted for
//! revocation?
//!
//! The HTTP server/router, cryptographic suite implementations, JSON-LD context fetching, DID
//! resolution, and revocation storage are all supplied by the host through the traits in
//! [`host`]; see the crate's framework adapters (e.g. `zcap-actix`) for how a particular
//! framework plugs those in.
//!
//! # Things To Know About This Crate
//! - It does not implement any cryptographic suite itself; bring your own via [`host::ProofSuite`].
//! - It does not fetch JSON-LD contexts or resolve DIDs; bring your own [`host::DocumentLoader`].
//! - It never persists revocations; [`pipeline::RevocationPipeline`] only verifies and hands the
//!   caller a [`model::RevocationContext`] to store however it likes.

pub mod chain;
pub mod clock;
pub mod delegation;
pub mod digest;
pub mod error;
pub mod expected_values;
pub mod host;
pub mod invocation;
pub mod model;
pub mod pipeline;
pub mod request;
pub mod root_capability;
pub mod signature_header;


pub use error::{ZcapError, ZcapErrorKind, ZcapResult};
pub use model::{
    Capability, ControllerSet, ExpectedValues, OneOrMany, ParsedSignature, Proof,
    RevocationContext, VerificationResult,
};
pub use pipeline::{
    InvocationPipeline, InvocationPipelineConfig, RevocationOutcome, RevocationPipeline,
    RevocationPipelineConfig,
};
pub use request::CoreRequest;
