use futures::{future::ready, StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    runtime::{
        reflector::{self, store::Writer, Store},
        watcher, WatchStreamExt,
    },
    Api, ResourceExt,
};
use tracing::{debug, info, warn};

/// Start a reflector that keeps an in-memory copy of all the Namespaces of the cluster.
///
/// The returned store is empty at first. It's populated in the background by a
/// Kubernetes watch that is restarted with a backoff on errors. Notifications are
/// not instantaneous, the store can hold stale data and it can miss namespaces that
/// have just been created.
pub(crate) fn start_namespace_reflector(kube_client: kube::Client) -> Store<Namespace> {
    info!("creating namespace reflector");

    let api = Api::<Namespace>::all(kube_client);
    let writer = Writer::default();
    let reader = writer.as_reader();

    let stream = watcher(api, watcher::Config::default()).map_ok(|ev| ev.modify(strip_namespace));
    let rf = reflector::reflector(writer, stream);

    tokio::spawn(async move {
        let infinite_watch = rf.default_backoff().touched_objects().for_each(|obj| {
            match obj {
                Ok(ns) => debug!(namespace = ns.name_any(), "watcher saw namespace"),
                Err(e) => warn!(error = ?e, "namespace watcher error"),
            };
            ready(())
        });
        infinite_watch.await
    });

    let ready_reader = reader.clone();
    tokio::spawn(async move {
        match ready_reader.wait_until_ready().await {
            Ok(_) => info!(
                namespaces = ready_reader.state().len(),
                "namespace reflector synced"
            ),
            Err(e) => warn!(error = ?e, "namespace reflector stopped before being ready"),
        }
    });

    reader
}

// Only the metadata of the namespaces is used
fn strip_namespace(ns: &mut Namespace) {
    // clear managed fields to reduce memory usage
    ns.managed_fields_mut().clear();
    // clear last-applied-configuration to reduce memory usage
    ns.annotations_mut()
        .remove("kubectl.kubernetes.io/last-applied-configuration");
    ns.spec = None;
    ns.status = None;
}
