use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::{api_error::ApiError, service, state::ApiServerState};

#[tracing::instrument(
    name = "admission_review",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        path=uri.path(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        subresource=tracing::field::Empty,
        kind_group=tracing::field::Empty,
        kind_version=tracing::field::Empty,
        kind=tracing::field::Empty,
        resource_group=tracing::field::Empty,
        resource_version=tracing::field::Empty,
        resource=tracing::field::Empty,
        allowed=tracing::field::Empty,
        mutated=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Serve the `/mutate` and `/validate` endpoints
pub(crate) async fn review_handler(
    State(state): State<Arc<ApiServerState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let reply = service::handle_request(&state, uri.path(), content_type, &body).await?;

    Ok((
        [(header::CONTENT_TYPE, service::JSON_CONTENT_TYPE)],
        reply,
    )
        .into_response())
}

pub(crate) async fn health_handler() -> &'static str {
    "ok"
}
