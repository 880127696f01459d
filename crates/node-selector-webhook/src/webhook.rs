use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    admission_review::{AdmissionRequest, AdmissionResponse},
    config::Settings,
    labels::{self, LabelSet},
    namespaces::NodeSelectorResolver,
    patch,
    policy_gate,
    scheme::{Scheme, TargetObject},
};

/// Takes the admission decisions of the `/mutate` and `/validate` endpoints
pub struct AdmissionController {
    scheme: Arc<Scheme>,
    settings: Arc<Settings>,
    resolver: NodeSelectorResolver,
}

impl AdmissionController {
    pub fn new(scheme: Arc<Scheme>, settings: Arc<Settings>, resolver: NodeSelectorResolver) -> Self {
        Self {
            scheme,
            settings,
            resolver,
        }
    }

    /// Enforce the node selector of the namespace on the Pod being created.
    ///
    /// Objects that cannot be decoded, and kinds other than Pod, are let through
    /// untouched.
    pub async fn mutate(&self, request: &AdmissionRequest) -> AdmissionResponse {
        let pod = match self.scheme.decode_target(request) {
            Ok(TargetObject::Pod(pod)) => pod,
            Ok(TargetObject::Unsupported(gvk)) => {
                debug!(
                    kind = gvk.kind.as_str(),
                    "object kind not handled, skipping mutation"
                );
                return with_uid(AdmissionResponse::allow(), request);
            }
            Err(e) => {
                warn!(error = %e, "cannot decode object, skipping mutation");
                return with_uid(AdmissionResponse::allow(), request);
            }
        };

        let response = self.mutate_pod(request, &pod).await;
        with_uid(response, request)
    }

    async fn mutate_pod(&self, request: &AdmissionRequest, pod: &Pod) -> AdmissionResponse {
        let mut metadata = pod.metadata.clone();
        if metadata.namespace.is_none() {
            metadata.namespace = request.namespace.clone();
        }
        if !policy_gate::mutation_required(&self.settings.ignored_namespaces, &metadata) {
            return AdmissionResponse::allow();
        }

        let namespace = request
            .namespace
            .as_deref()
            .or(metadata.namespace.as_deref())
            .unwrap_or_default();
        let pod_name = pod_name(request, pod);

        let namespace_selector = match self.resolver.resolve(namespace).await {
            Ok(selector) => selector,
            Err(e) => {
                warn!(namespace, error = %e, "cannot resolve namespace node selector");
                return AdmissionResponse::reject(e.to_string());
            }
        };

        let pod_selector: LabelSet = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_selector.clone())
            .unwrap_or_default();

        if labels::conflicts(&namespace_selector, &pod_selector) {
            info!(
                pod = pod_name.as_str(),
                namespace, "pod node selector conflicts with the namespace one"
            );
            return AdmissionResponse::reject(format!(
                "pod node label selector conflicts with its namespace node label selector: pod {pod_name}, namespace {namespace}"
            ));
        }

        let selector = labels::merge(&namespace_selector, &pod_selector);
        match patch::build_patch(&selector) {
            Ok(patch) => {
                debug!(
                    pod = pod_name.as_str(),
                    namespace,
                    node_selector = ?selector,
                    "enforcing node selector"
                );
                AdmissionResponse::allow_with_patch(&patch)
            }
            Err(e) => AdmissionResponse::reject(e.to_string()),
        }
    }

    /// Only Pods are decoded, everything else is allowed. No rule is enforced
    /// on Pods yet.
    pub async fn validate(&self, request: &AdmissionRequest) -> AdmissionResponse {
        let pod = match self.scheme.decode_target(request) {
            Ok(TargetObject::Pod(pod)) => pod,
            Ok(TargetObject::Unsupported(_)) => {
                return with_uid(AdmissionResponse::allow(), request)
            }
            Err(e) => {
                warn!(error = %e, "cannot decode object");
                return with_uid(AdmissionResponse::reject(e.to_string()), request);
            }
        };

        let mut metadata = pod.metadata.clone();
        if metadata.namespace.is_none() {
            metadata.namespace = request.namespace.clone();
        }
        policy_gate::validation_required(&self.settings.ignored_namespaces, &metadata);

        with_uid(AdmissionResponse::allow(), request)
    }
}

fn with_uid(mut response: AdmissionResponse, request: &AdmissionRequest) -> AdmissionResponse {
    response.uid = request.uid.clone();
    response
}

// Pods created by controllers have only a generateName at admission time
fn pod_name(request: &AdmissionRequest, pod: &Pod) -> String {
    pod.metadata
        .name
        .clone()
        .or_else(|| request.name.clone())
        .or_else(|| pod.metadata.generate_name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::{CacheLookup, MockClusterClient, MockNamespaceCache};
    use k8s_openapi::api::core::v1::Namespace;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn controller(namespace_selector: &'static str) -> AdmissionController {
        let settings = Arc::new(Settings::default());

        let mut cache = MockNamespaceCache::new();
        cache.expect_get().returning(move |name| {
            CacheLookup::Hit(Namespace {
                metadata: ObjectMeta {
                    name: Some(name.to_owned()),
                    annotations: Some(BTreeMap::from([(
                        "scheduler.alpha.kubernetes.io/node-selector".to_owned(),
                        namespace_selector.to_owned(),
                    )])),
                    ..Default::default()
                },
                ..Default::default()
            })
        });
        let mut client = MockClusterClient::new();
        client.expect_get_namespace().never();

        let resolver = NodeSelectorResolver::new(
            Arc::new(cache),
            Arc::new(client),
            settings.clone(),
            Duration::from_secs(1),
        );

        AdmissionController::new(Arc::new(Scheme::default()), settings, resolver)
    }

    fn request(namespace: &str, object: serde_json::Value) -> AdmissionRequest {
        serde_json::from_value(json!({
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "namespace": namespace,
            "operation": "CREATE",
            "object": object,
        }))
        .unwrap()
    }

    fn pod(node_selector: serde_json::Value) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "nginx"},
            "spec": {
                "containers": [{"name": "nginx", "image": "nginx"}],
                "nodeSelector": node_selector,
            }
        })
    }

    fn patched_node_selector(response: &AdmissionResponse) -> serde_json::Value {
        let patch: serde_json::Value =
            serde_json::from_slice(&response.decoded_patch().expect("patch expected")).unwrap();
        assert_eq!("replace", patch[0]["op"]);
        assert_eq!("/spec/nodeSelector", patch[0]["path"]);
        patch[0]["value"].clone()
    }

    #[tokio::test]
    async fn mutate_enforces_namespace_selector() {
        let request = request("team-a", pod(json!({})));

        let response = controller("zone=a").mutate(&request).await;

        assert!(response.allowed);
        assert_eq!(request.uid, response.uid);
        assert_eq!(
            Some(crate::admission_review::PatchType::JSONPatch),
            response.patch_type
        );
        assert_eq!(json!({"zone": "a"}), patched_node_selector(&response));
    }

    #[tokio::test]
    async fn mutate_keeps_pod_selector() {
        let request = request("team-a", pod(json!({"disk": "ssd", "zone": "a"})));

        let response = controller("zone=a").mutate(&request).await;

        assert!(response.allowed);
        assert_eq!(
            json!({"disk": "ssd", "zone": "a"}),
            patched_node_selector(&response)
        );
    }

    #[tokio::test]
    async fn mutate_rejects_conflicts() {
        let request = request("team-a", pod(json!({"zone": "a"})));

        let response = controller("zone=b").mutate(&request).await;

        assert!(!response.allowed);
        assert!(response.patch.is_none());
        let message = response.message().unwrap();
        assert!(message.contains("conflicts"));
        assert!(message.contains("nginx"));
        assert!(message.contains("team-a"));
    }

    #[tokio::test]
    async fn mutate_skips_ignored_namespaces() {
        let request = request("kube-system", pod(json!({"zone": "a"})));

        let response = controller("zone=b").mutate(&request).await;

        assert!(response.allowed);
        assert!(response.patch.is_none());
        assert!(response.status.is_none());
    }

    #[tokio::test]
    async fn mutate_fails_open_on_undecodable_object() {
        let request = request("team-a", json!({"spec": {"nodeSelector": "zone=a"}}));

        let response = controller("zone=b").mutate(&request).await;

        assert!(response.allowed);
        assert!(response.patch.is_none());
    }

    #[tokio::test]
    async fn mutate_ignores_other_kinds() {
        let mut request = request("team-a", json!({"apiVersion": "v1", "kind": "ConfigMap"}));
        request.kind.kind = "ConfigMap".to_owned();

        let response = controller("zone=b").mutate(&request).await;

        assert!(response.allowed);
        assert!(response.patch.is_none());
    }

    #[tokio::test]
    async fn mutate_rejects_invalid_namespace_selector() {
        let request = request("team-a", pod(json!({})));

        let response = controller("zone").mutate(&request).await;

        assert!(!response.allowed);
        assert!(response.message().is_some());
    }

    #[tokio::test]
    async fn validate_allows_pods() {
        let request = request("team-a", pod(json!({"zone": "a"})));

        let response = controller("zone=b").validate(&request).await;

        assert!(response.allowed);
        assert_eq!(request.uid, response.uid);
        assert!(response.patch.is_none());
    }

    #[tokio::test]
    async fn validate_rejects_undecodable_pods() {
        let request = request("team-a", json!({"spec": {"nodeSelector": "zone=a"}}));

        let response = controller("zone=b").validate(&request).await;

        assert!(!response.allowed);
        assert!(response.message().unwrap().contains("Pod"));
    }

    #[tokio::test]
    async fn validate_allows_other_kinds() {
        let mut request = request("team-a", json!("not even an object"));
        request.kind.kind = "ConfigMap".to_owned();

        let response = controller("zone=b").validate(&request).await;

        assert!(response.allowed);
        assert!(response.status.is_none());
    }
}
