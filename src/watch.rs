/*
    Copyright 2024 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! The Watch Multiplexer: subscribes to the three event streams and drives
//! the cluster view and synchronizer from a single cooperative loop. Event
//! order within a stream is preserved; across streams it is whichever
//! arrives first (no total order is promised).
//!
//! Each stream is seeded once via a direct list before the live watch
//! begins, the same way a list-then-watch bootstrap avoids missing objects
//! created between startup and the first watch poll; a relist
//! (`Restarted`) afterwards is logged and otherwise ignored, since every
//! object it carries will also arrive as a fresh `Applied` once the watch
//! resumes.

use futures_util::StreamExt;
use k8s_openapi::api::core::v1::{Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ListParams;
use kube::runtime::watcher;
use kube::runtime::watcher::{Config, Event};
use kube::{Api, Client};

use crate::cluster_view::ClusterView;
use crate::dns::Synchronizer;
use crate::model::EventKind;

/// Namespace services are watched in. Ingress-controller-fronting services
/// are expected to live in a privileged namespace alongside the ingress
/// controller itself.
pub const CONTROLLER_NAMESPACE: &str = "kube-system";

/// Owns the cluster view and synchronizer and runs the single loop that
/// ties the three watch streams to them. Constructed once at startup; not
/// process-global state.
pub struct WatchMultiplexer {
    client: Client,
    view: ClusterView,
    synchronizer: Synchronizer,
}

impl WatchMultiplexer {
    pub fn new(client: Client, view: ClusterView, synchronizer: Synchronizer) -> Self {
        Self {
            client,
            view,
            synchronizer,
        }
    }

    /// Run until any of the three streams closes. Error events are logged
    /// and skipped; they do not terminate the loop. Stream closure does
    /// (the caller is expected to exit the process afterwards).
    pub async fn run(mut self) {
        let ingress_api: Api<Ingress> = Api::all(self.client.clone());
        let node_api: Api<Node> = Api::all(self.client.clone());
        let service_api: Api<Service> = Api::namespaced(self.client.clone(), CONTROLLER_NAMESPACE);

        self.seed_ingresses(&ingress_api).await;
        self.seed_nodes(&node_api).await;
        self.seed_services(&service_api).await;

        let mut ingress_stream = Box::pin(watcher(ingress_api, Config::default()));
        let mut node_stream = Box::pin(watcher(node_api, Config::default()));
        let mut service_stream = Box::pin(watcher(service_api, Config::default()));

        loop {
            tokio::select! {
                event = ingress_stream.next() => {
                    match event {
                        Some(Ok(event)) => self.handle_ingress_event(event).await,
                        Some(Err(e)) => log::warn!("ingress watch error: {e}"),
                        None => {
                            log::error!("ingress watch stream closed, terminating");
                            return;
                        }
                    }
                }
                event = node_stream.next() => {
                    match event {
                        Some(Ok(event)) => self.handle_node_event(event).await,
                        Some(Err(e)) => log::warn!("node watch error: {e}"),
                        None => {
                            log::error!("node watch stream closed, terminating");
                            return;
                        }
                    }
                }
                event = service_stream.next() => {
                    match event {
                        Some(Ok(event)) => self.handle_service_event(event).await,
                        Some(Err(e)) => log::warn!("ingress-controller service watch error: {e}"),
                        None => {
                            log::error!("ingress-controller service watch stream closed, terminating");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn seed_ingresses(&mut self, api: &Api<Ingress>) {
        match api.list(&ListParams::default()).await {
            Ok(list) => {
                for ingress in list {
                    self.apply_ingress(&ingress, EventKind::Added).await;
                }
            }
            Err(e) => log::warn!("failed to list existing ingresses: {e}"),
        }
    }

    async fn seed_nodes(&mut self, api: &Api<Node>) {
        match api.list(&ListParams::default()).await {
            Ok(list) => {
                for node in list {
                    self.apply_node(&node, EventKind::Added).await;
                }
            }
            Err(e) => log::warn!("failed to list existing nodes: {e}"),
        }
    }

    async fn seed_services(&mut self, api: &Api<Service>) {
        match api.list(&ListParams::default()).await {
            Ok(list) => {
                for service in list {
                    self.apply_service(&service, EventKind::Added).await;
                }
            }
            Err(e) => log::warn!("failed to list existing ingress-controller services: {e}"),
        }
    }

    async fn handle_ingress_event(&mut self, event: Event<Ingress>) {
        match event {
            Event::Applied(ingress) => {
                let kind = if self.view.has_ingress(&ingress) {
                    EventKind::Modified
                } else {
                    EventKind::Added
                };
                self.apply_ingress(&ingress, kind).await;
            }
            Event::Deleted(ingress) => self.apply_ingress(&ingress, EventKind::Deleted).await,
            Event::Restarted(_) => log::debug!("ingress watch restarted"),
        }
    }

    async fn handle_node_event(&mut self, event: Event<Node>) {
        match event {
            Event::Applied(node) => {
                let kind = if self.view.has_node(&node) {
                    EventKind::Modified
                } else {
                    EventKind::Added
                };
                self.apply_node(&node, kind).await;
            }
            Event::Deleted(node) => self.apply_node(&node, EventKind::Deleted).await,
            Event::Restarted(_) => log::debug!("node watch restarted"),
        }
    }

    async fn handle_service_event(&mut self, event: Event<Service>) {
        match event {
            Event::Applied(service) => {
                // A resync redelivers Applied for services already known;
                // the view treats that as Modified, which it no-ops per
                // the "controller Modified is latched at Add" rule.
                let kind = if self.view.has_controller(&service) {
                    EventKind::Modified
                } else {
                    EventKind::Added
                };
                self.apply_service(&service, kind).await;
            }
            Event::Deleted(service) => self.apply_service(&service, EventKind::Deleted).await,
            Event::Restarted(_) => log::debug!("ingress-controller service watch restarted"),
        }
    }

    async fn apply_ingress(&mut self, ingress: &Ingress, kind: EventKind) {
        log::info!(
            "{kind:?} ingress {}/{}",
            ingress.metadata.namespace.as_deref().unwrap_or(""),
            ingress.metadata.name.as_deref().unwrap_or("")
        );
        let change = self.view.update_ingress(ingress, kind);
        self.synchronizer.apply(&change).await;
    }

    async fn apply_node(&mut self, node: &Node, kind: EventKind) {
        log::info!(
            "{kind:?} node {}",
            node.metadata.name.as_deref().unwrap_or("")
        );
        let change = self.view.update_node(node, kind);
        self.synchronizer.apply(&change).await;
    }

    async fn apply_service(&mut self, service: &Service, kind: EventKind) {
        log::info!(
            "{kind:?} service {}",
            service.metadata.name.as_deref().unwrap_or("")
        );
        let change = self.view.update_ing_ctrl_svc(service, kind);
        self.synchronizer.apply(&change).await;
    }
}
