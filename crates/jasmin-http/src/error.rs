//! Translates core/router errors into the literal `Success "..."` /
//! `Error "..."` response bodies of §6, the same taxonomy-to-status
//! mapping `JasminError::http_status`/`http_body` already define.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jasmin_proto::JasminError;
use jasmin_router::RouterError;

pub struct HttpError(pub JasminError);

impl From<JasminError> for HttpError {
    fn from(err: JasminError) -> Self {
        Self(err)
    }
}

impl From<RouterError> for HttpError {
    fn from(err: RouterError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.0.http_body()).into_response()
    }
}
