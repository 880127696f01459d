use base64::{engine::general_purpose, Engine as _};
use k8s_openapi::api::authentication::v1::UserInfo;
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use serde::{Deserialize, Serialize};

pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";
pub const ADMISSION_V1: &str = "admission.k8s.io/v1";
pub const ADMISSION_V1BETA1: &str = "admission.k8s.io/v1beta1";

/// The AdmissionReview sent by the Kubernetes API server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    #[serde(default)]
    pub resource: GroupVersionResource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_kind: Option<GroupVersionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_resource: Option<GroupVersionResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub user_info: UserInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<RawExtension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_object: Option<RawExtension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<RawExtension>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// This models the admission/v1/AdmissionResponse object of Kubernetes
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    /// UID is an identifier for the individual request/response.
    /// This must be copied over from the corresponding AdmissionRequest.
    pub uid: String,

    /// Allowed indicates whether or not the admission request was permitted.
    pub allowed: bool,

    /// The type of Patch. Currently we only allow "JSONPatch".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,

    /// The patch body, base64 encoded. Currently we only support "JSONPatch" which implements RFC 6902.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    /// Status contains extra details into why an admission request was denied.
    /// This field IS NOT consulted in any way if "Allowed" is "true".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionResponseStatus>,
}

/// PatchType is the type of patch being used to represent the mutated object
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    #[default]
    JSONPatch,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct AdmissionResponseStatus {
    /// A human-readable description of the status of this operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Suggested HTTP return code for this status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl AdmissionResponse {
    pub fn allow() -> AdmissionResponse {
        AdmissionResponse {
            allowed: true,
            ..Default::default()
        }
    }

    /// Allow the request and mutate it with the given JSON Patch
    pub fn allow_with_patch(patch: &[u8]) -> AdmissionResponse {
        AdmissionResponse {
            allowed: true,
            patch_type: Some(PatchType::JSONPatch),
            patch: Some(general_purpose::STANDARD.encode(patch)),
            ..Default::default()
        }
    }

    /// A response carrying only a message, `allowed` is left to its default
    pub fn reject(message: String) -> AdmissionResponse {
        AdmissionResponse {
            allowed: false,
            status: Some(AdmissionResponseStatus {
                message: Some(message),
                code: None,
            }),
            ..Default::default()
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.message.as_deref())
    }

    /// Decode the base64 patch carried by the response
    pub fn decoded_patch(&self) -> Option<Vec<u8>> {
        self.patch
            .as_ref()
            .and_then(|p| general_purpose::STANDARD.decode(p).ok())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    pub response: AdmissionResponse,
}

impl AdmissionReviewResponse {
    pub fn new(api_version: &str, response: AdmissionResponse) -> Self {
        AdmissionReviewResponse {
            api_version: Some(api_version.to_owned()),
            kind: Some(String::from(ADMISSION_REVIEW_KIND)),
            response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_reject_response() {
        let response = AdmissionResponse::reject("test message".to_owned());

        assert!(!response.allowed);
        assert_eq!(response.patch, None);
        assert_eq!(response.patch_type, None);
        assert_eq!(response.message(), Some("test message"));
    }

    #[test]
    fn patch_is_base64_encoded_on_the_wire() {
        let response = AdmissionResponse::allow_with_patch(b"[]");

        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json!({
                "uid": "",
                "allowed": true,
                "patchType": "JSONPatch",
                "patch": "W10=",
            }),
            serialized
        );
        assert_eq!(Some(b"[]".to_vec()), response.decoded_patch());
    }

    #[test]
    fn allow_response_has_no_optional_fields() {
        let serialized = serde_json::to_value(AdmissionResponse::allow()).unwrap();

        assert_eq!(json!({"uid": "", "allowed": true}), serialized);
    }

    #[test]
    fn deserialize_request_with_minimal_fields() {
        let input = json!({
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "namespace": "default",
            "object": {"apiVersion": "v1", "kind": "Pod"}
        });

        let request: AdmissionRequest = serde_json::from_value(input).unwrap();
        assert_eq!("Pod", request.kind.kind);
        assert_eq!(Some("default".to_owned()), request.namespace);
        assert!(request.user_info.username.is_none());
        assert!(request.object.is_some());
    }
}
