//! Converts a core verification failure into an actix-web HTTP response.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use derive_more::{Display, From};

/// Wraps [`zcap_core::ZcapError`] so it can be returned from a middleware or handler as an
/// `actix_web::Error`.
///
/// The response body is the `{name, message}` shape published on failure; hosts that want a
/// different error surface should catch [`zcap_core::ZcapError`] before it reaches this wrapper.
#[derive(Debug, Display, From)]
#[display("{_0}")]
pub struct ZcapActixError(pub zcap_core::ZcapError);

impl ResponseError for ZcapActixError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.0.to_json())
    }
}
