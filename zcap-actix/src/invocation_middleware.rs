//! Wraps a service so that every request must carry a valid zcap invocation.

use std::{rc::Rc, sync::Arc};

use actix_service::{forward_ready, Service, Transform};
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Bytes,
    Error, HttpMessage,
};
use futures_core::future::LocalBoxFuture;
use tracing::trace;
use zcap_core::InvocationPipeline;

use crate::{error::ZcapActixError, request::core_request_from_service};

/// Runs [`InvocationPipeline::verify`] ahead of every request the wrapped service handles.
///
/// On success, the [`zcap_core::VerificationResult`] is inserted into the request's extensions
/// for downstream handlers to read via the [`crate::ZcapInvocation`] extractor; on failure, the
/// request is short-circuited with the mapped HTTP status.
#[derive(Clone)]
pub struct ZcapInvocationAuth {
    pipeline: Arc<InvocationPipeline>,
}

impl ZcapInvocationAuth {
    pub fn new(pipeline: Arc<InvocationPipeline>) -> Self {
        Self { pipeline }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ZcapInvocationAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ZcapInvocationAuthMiddleware<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(ZcapInvocationAuthMiddleware {
            service: Rc::new(service),
            pipeline: Arc::clone(&self.pipeline),
        }))
    }
}

pub struct ZcapInvocationAuthMiddleware<S> {
    service: Rc<S>,
    pipeline: Arc<InvocationPipeline>,
}

impl<S, B> Service<ServiceRequest> for ZcapInvocationAuthMiddleware<S>
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
            let body = buffer_body(&mut req).await?;
            let mut core_req = core_request_from_service(&req, body);

            match pipeline.verify(&mut core_req).await {
                Ok(result) => {
                    trace!(controller = %result.controller, "zcap invocation authorized");
                    req.extensions_mut().insert(result);
                    service.call(req).await
                }
                Err(err) => Err(ZcapActixError(err).into()),
            }
        })
    }
}

/// Reads the full request body into memory and reattaches it to `req` so downstream extractors
/// can still consume it.
///
/// Always returns `Some`, even for an empty body; [`zcap_core::digest::DigestVerifier`] is the
/// one that decides, from headers alone, whether a body is actually present.
pub(crate) async fn buffer_body(req: &mut ServiceRequest) -> Result<Option<Bytes>, Error> {
    let bytes = req.extract::<Bytes>().await?;
    req.set_payload(actix_web::dev::Payload::from(bytes.clone()));
    Ok(Some(bytes))
}
