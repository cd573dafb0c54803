//! Builds a [`zcap_core::CoreRequest`] from an in-flight actix-web request.

use actix_web::{dev::ServiceRequest, web::Bytes};
use zcap_core::CoreRequest;

/// Converts `req`'s method, absolute URL, headers, and (already-buffered) body into the
/// framework-agnostic request the core pipelines operate on.
///
/// `req`'s connection info is used to recover scheme and authority, since actix-web's `Uri`
/// usually only carries the path and query for origin-form requests.
pub(crate) fn core_request_from_service(req: &ServiceRequest, body: Option<Bytes>) -> CoreRequest {
    let conn = req.connection_info().clone();
    let url = format!("{}://{}{}", conn.scheme(), conn.host(), req.uri());

    let mut core_req = CoreRequest::new(req.method().clone(), url);
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            core_req = core_req.with_header(name.as_str(), value);
        }
    }
    if let Some(body) = body {
        core_req = core_req.with_body(body.to_vec());
    }
    core_req
}
