use axum::http::StatusCode;
use std::fmt;
use tracing::{debug, error, warn, Span};

use crate::{
    admission_review::{
        AdmissionRequest, AdmissionResponse, AdmissionReviewResponse, ADMISSION_REVIEW_KIND,
        ADMISSION_V1,
    },
    api::{api_error::ApiError, state::ApiServerState},
};

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Mutate,
    Validate,
}

impl Endpoint {
    pub(crate) fn from_path(path: &str) -> Option<Endpoint> {
        match path {
            "/mutate" => Some(Endpoint::Mutate),
            "/validate" => Some(Endpoint::Validate),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Endpoint::Mutate => write!(f, "mutate"),
            Endpoint::Validate => write!(f, "validate"),
        }
    }
}

/// Turn the body of an admission HTTP request into the body of the reply.
///
/// Errors are HTTP level failures. Admission failures are reported inside
/// of the AdmissionReview, with a 200 status code.
pub(crate) async fn handle_request(
    state: &ApiServerState,
    path: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Vec<u8>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "request body is empty"));
    }

    if content_type != Some(JSON_CONTENT_TYPE) {
        return Err(ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!(
                "contentType={}, expected {JSON_CONTENT_TYPE}",
                content_type.unwrap_or_default()
            ),
        ));
    }

    let review = match state.scheme.decode_review(body) {
        Ok(review) => review,
        Err(e) => {
            warn!(error = %e, "cannot decode AdmissionReview");
            let (api_version, uid) = sniff_envelope(state, body);
            let mut response = AdmissionResponse::reject(e.to_string());
            response.uid = uid;
            populate_span_with_admission_response(&response);
            return encode(&AdmissionReviewResponse::new(&api_version, response));
        }
    };
    debug!(admission_request = ?review.request, "AdmissionReview decoded");
    populate_span_with_admission_request_data(&review.request);

    let endpoint = Endpoint::from_path(path).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, format!("no handler for {path}"))
    })?;
    let response = match endpoint {
        Endpoint::Mutate => state.controller.mutate(&review.request).await,
        Endpoint::Validate => state.controller.validate(&review.request).await,
    };
    debug!(%endpoint, response = ?response, "admission decision taken");
    populate_span_with_admission_response(&response);

    encode(&AdmissionReviewResponse::new(&review.api_version, response))
}

fn encode(review: &AdmissionReviewResponse) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(review).map_err(|e| {
        error!(error = %e, "cannot encode AdmissionReview");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
    })
}

// Best effort recovery of the apiVersion and uid of an envelope that
// could not be decoded
fn sniff_envelope(state: &ApiServerState, body: &[u8]) -> (String, String) {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();

    let api_version = value
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .filter(|v| state.scheme.is_registered(v, ADMISSION_REVIEW_KIND))
        .unwrap_or(ADMISSION_V1)
        .to_owned();
    let uid = value
        .pointer("/request/uid")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned();

    (api_version, uid)
}

fn populate_span_with_admission_request_data(adm_req: &AdmissionRequest) {
    Span::current().record("kind", adm_req.kind.kind.as_str());
    Span::current().record("kind_group", adm_req.kind.group.as_str());
    Span::current().record("kind_version", adm_req.kind.version.as_str());
    Span::current().record("name", adm_req.name.clone().unwrap_or_default().as_str());
    Span::current().record(
        "namespace",
        adm_req.namespace.clone().unwrap_or_default().as_str(),
    );
    Span::current().record("operation", adm_req.operation.as_str());
    Span::current().record("request_uid", adm_req.uid.as_str());
    Span::current().record("resource", adm_req.resource.resource.as_str());
    Span::current().record("resource_group", adm_req.resource.group.as_str());
    Span::current().record("resource_version", adm_req.resource.version.as_str());
    Span::current().record(
        "subresource",
        adm_req.sub_resource.clone().unwrap_or_default().as_str(),
    );
}

fn populate_span_with_admission_response(response: &AdmissionResponse) {
    Span::current().record("allowed", response.allowed);
    Span::current().record("mutated", response.patch.is_some());
    if let Some(message) = response.message() {
        Span::current().record("response_message", message);
    }
}
