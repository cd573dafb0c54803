//! actix-web middleware adapter for [`zcap_core`], the framework-agnostic zcap invocation
//! verifier.
//!
//! # What Is This Crate?
//! Two `actix_service::Transform`s: [`ZcapInvocationAuth`] wraps any route that must be invoked
//! with a valid zcap, and [`ZcapRevocationAuth`] wraps a route mounted at
//! `<anyPrefix>/revocations/<revocationId>` to accept a zcap delegation for revocation. Both
//! publish their result to the request's extensions for downstream handlers to read via
//! [`ZcapInvocation`]/[`ZcapRevocation`].
//!
//! Build a [`zcap_core::InvocationPipeline`] or [`zcap_core::RevocationPipeline`] with your own
//! `DocumentLoader`, `RootControllerResolver`, `VerifierResolver`, and `SuiteFactory`
//! implementations, wrap it in an `Arc`, and pass it to the middleware constructor.

mod error;
mod extract;
mod invocation_middleware;
mod request;
mod revocation_middleware;

pub use error::ZcapActixError;
pub use extract::{ZcapInvocation, ZcapRevocation};
pub use invocation_middleware::{ZcapInvocationAuth, ZcapInvocationAuthMiddleware};
pub use revocation_middleware::{ZcapRevocationAuth, ZcapRevocationAuthMiddleware};
