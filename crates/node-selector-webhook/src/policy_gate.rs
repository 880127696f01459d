use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeSet;
use tracing::info;

/// Returns `false` when the object lives inside of one of the ignored namespaces
pub fn admission_required(ignored_namespaces: &BTreeSet<String>, metadata: &ObjectMeta) -> bool {
    let namespace = metadata.namespace.as_deref().unwrap_or_default();

    if ignored_namespaces.contains(namespace) {
        info!(
            name = metadata.name.as_deref().unwrap_or_default(),
            namespace, "skip admission, object is inside of an ignored namespace"
        );
        return false;
    }

    true
}

pub fn mutation_required(ignored_namespaces: &BTreeSet<String>, metadata: &ObjectMeta) -> bool {
    let required = admission_required(ignored_namespaces, metadata);
    info!(
        name = metadata.name.as_deref().unwrap_or_default(),
        namespace = metadata.namespace.as_deref().unwrap_or_default(),
        required,
        "mutation policy"
    );
    required
}

pub fn validation_required(ignored_namespaces: &BTreeSet<String>, metadata: &ObjectMeta) -> bool {
    let required = admission_required(ignored_namespaces, metadata);
    info!(
        name = metadata.name.as_deref().unwrap_or_default(),
        namespace = metadata.namespace.as_deref().unwrap_or_default(),
        required,
        "validation policy"
    );
    required
}
