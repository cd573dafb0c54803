//! Extractors for reading the verification results a zcap middleware publishes to the request.

use actix_utils::future::{err, ok, Ready};
use actix_web::{dev::Payload, error, FromRequest, HttpRequest};
use derive_more::{Deref, DerefMut};

use zcap_core::{RevocationContext, VerificationResult};

/// The invocation result published by [`crate::ZcapInvocationAuth`] or
/// [`crate::ZcapRevocationAuth`] after a request's zcap invocation has been verified.
///
/// Mirrors the `ThinData`/`LocalData` extractors: the middleware populates this via
/// `req.extensions_mut()`, and handlers pull it out with this extractor. Missing it means the
/// route isn't wrapped in one of this crate's middlewares.
#[derive(Debug, Clone, Deref, DerefMut)]
pub struct ZcapInvocation(pub VerificationResult);

impl FromRequest for ZcapInvocation {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<VerificationResult>().cloned() {
            Some(result) => ok(ZcapInvocation(result)),
            None => err(error::ErrorInternalServerError(
                "no zcap invocation result on this request; is the route wrapped in \
                 ZcapInvocationAuth or ZcapRevocationAuth?",
            )),
        }
    }
}

/// The revocation context published by [`crate::ZcapRevocationAuth`] once a submitted delegation
/// has been verified for revocation.
#[derive(Debug, Clone, Deref, DerefMut)]
pub struct ZcapRevocation(pub RevocationContext);

impl FromRequest for ZcapRevocation {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<RevocationContext>().cloned() {
            Some(ctx) => ok(ZcapRevocation(ctx)),
            None => err(error::ErrorInternalServerError(
                "no zcap revocation context on this request; is the route wrapped in \
                 ZcapRevocationAuth?",
            )),
        }
    }
}
