use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::admission_review::{
    AdmissionRequest, AdmissionReviewRequest, GroupVersionKind, ADMISSION_REVIEW_KIND,
    ADMISSION_V1, ADMISSION_V1BETA1,
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("couldn't get version/kind; json parse error: {0}")]
    VersionKind(#[source] serde_json::Error),

    #[error("Object 'Kind' is missing in AdmissionReview")]
    MissingKind,

    #[error("Object 'apiVersion' is missing in AdmissionReview")]
    MissingApiVersion,

    #[error("no kind \"{kind}\" is registered for version \"{api_version}\"")]
    NotRegistered { api_version: String, kind: String },

    #[error("cannot decode AdmissionReview: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("AdmissionReview does not contain a request")]
    MissingRequest,

    #[error("AdmissionRequest does not contain an object")]
    MissingObject,

    #[error("cannot decode {kind}: {source}")]
    Object {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The objects this webhook knows how to decode from an AdmissionRequest
#[derive(Debug, Clone)]
pub enum TargetObject {
    Pod(Box<Pod>),
    /// Any kind without a decoder. Mutation lets it through untouched, validation allows it.
    Unsupported(GroupVersionKind),
}

/// An AdmissionReview that passed the version/kind checks of the [`Scheme`]
#[derive(Debug, Clone)]
pub struct DecodedReview {
    pub api_version: String,
    pub request: AdmissionRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeMeta {
    api_version: Option<String>,
    kind: Option<String>,
}

/// Registry of the AdmissionReview versions understood by the webhook.
///
/// Built once at startup and shared read-only by all the request handlers.
#[derive(Debug, Clone)]
pub struct Scheme {
    review_versions: BTreeSet<String>,
}

impl Default for Scheme {
    fn default() -> Self {
        Scheme::new([ADMISSION_V1, ADMISSION_V1BETA1])
    }
}

impl Scheme {
    pub fn new<I, S>(review_versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Scheme {
            review_versions: review_versions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_registered(&self, api_version: &str, kind: &str) -> bool {
        kind == ADMISSION_REVIEW_KIND && self.review_versions.contains(api_version)
    }

    /// Decode the body of an HTTP request into an AdmissionReview.
    /// The `apiVersion` and `kind` of the envelope are checked before the
    /// whole document is decoded.
    pub fn decode_review(&self, body: &[u8]) -> Result<DecodedReview, DecodeError> {
        let type_meta: TypeMeta = serde_json::from_slice(body).map_err(DecodeError::VersionKind)?;
        let kind = type_meta.kind.ok_or(DecodeError::MissingKind)?;
        let api_version = type_meta.api_version.ok_or(DecodeError::MissingApiVersion)?;

        if !self.is_registered(&api_version, &kind) {
            return Err(DecodeError::NotRegistered { api_version, kind });
        }

        let review: AdmissionReviewRequest =
            serde_json::from_slice(body).map_err(DecodeError::Envelope)?;
        let request = review.request.ok_or(DecodeError::MissingRequest)?;

        Ok(DecodedReview {
            api_version,
            request,
        })
    }

    /// Decode the object carried by the request. Only Pods are decoded, all
    /// the other kinds are reported as [`TargetObject::Unsupported`]
    pub fn decode_target(&self, request: &AdmissionRequest) -> Result<TargetObject, DecodeError> {
        if !is_pod(&request.kind) {
            return Ok(TargetObject::Unsupported(request.kind.clone()));
        }

        let raw = request.object.as_ref().ok_or(DecodeError::MissingObject)?;
        let pod: Pod = serde_json::from_value(raw.0.clone()).map_err(|source| DecodeError::Object {
            kind: request.kind.kind.clone(),
            source,
        })?;

        Ok(TargetObject::Pod(Box::new(pod)))
    }
}

fn is_pod(gvk: &GroupVersionKind) -> bool {
    gvk.group.is_empty() && gvk.kind == "Pod"
}
