//! Wraps a service mounted at `<anyPrefix>/revocations/<revocationId>` with the opinionated
//! revocation pipeline.

use std::{rc::Rc, sync::Arc};

use actix_service::{forward_ready, Service, Transform};
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    Error, HttpMessage,
};
use futures_core::future::LocalBoxFuture;
use tracing::trace;
use zcap_core::RevocationPipeline;

use crate::{error::ZcapActixError, invocation_middleware::buffer_body, request::core_request_from_service};

/// Runs [`RevocationPipeline::verify`] ahead of every request the wrapped service handles.
///
/// On success, both the [`zcap_core::VerificationResult`] and the
/// [`zcap_core::RevocationContext`] are inserted into the request's extensions; the downstream
/// handler is responsible for actually recording the revocation, since the core never persists
/// it. Read them back with the [`crate::ZcapInvocation`]/[`crate::ZcapRevocation`] extractors.
#[derive(Clone)]
pub struct ZcapRevocationAuth {
    pipeline: Arc<RevocationPipeline>,
}

impl ZcapRevocationAuth {
    pub fn new(pipeline: Arc<RevocationPipeline>) -> Self {
        Self { pipeline }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ZcapRevocationAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ZcapRevocationAuthMiddleware<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(ZcapRevocationAuthMiddleware {
            service: Rc::new(service),
            pipeline: Arc::clone(&self.pipeline),
        }))
    }
}

pub struct ZcapRevocationAuthMiddleware<S> {
    service: Rc<S>,
    pipeline: Arc<RevocationPipeline>,
}

impl<S, B> Service<ServiceRequest> for ZcapRevocationAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let pipeline = Arc::clone(&self.pipeline);

        Box::pin(async move {
            let route_path = req.path().to_owned();
            let body = buffer_body(&mut req).await?;
            let mut core_req = core_request_from_service(&req, body);

            match pipeline.verify(&mut core_req, &route_path).await {
                Ok(outcome) => {
                    trace!(
                        delegator = %outcome.revocation.delegator,
                        "zcap revocation submission authorized"
                    );
                    req.extensions_mut().insert(outcome.invocation);
                    req.extensions_mut().insert(outcome.revocation);
                    service.call(req).await
                }
                Err(err) => Err(ZcapActixError(err).into()),
            }
        })
    }
}
