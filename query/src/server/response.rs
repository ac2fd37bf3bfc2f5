//! HTTP response conversion for the query server.

use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::service::RenderedResponse;

impl IntoResponse for RenderedResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type.as_str())],
            self.body,
        )
            .into_response()
    }
}
