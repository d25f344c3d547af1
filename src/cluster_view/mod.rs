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

//! The canonical in-memory model of the cluster: ingresses, nodes, and
//! ingress controllers. Every event mutates exactly one of these maps and
//! returns a [`RouteChange`] computed from the result. The view itself
//! never performs I/O and routes are never stored, only derived.

mod record;

use std::collections::HashMap;

use k8s_openapi::api::core::v1::{Node, Service};
use k8s_openapi::api::networking::v1::Ingress;

use crate::error::ViewError;
use crate::model::{EventKind, Route, RouteChange, RouteEntry};

pub use record::{ControllerRecord, IngressRecord, NodeRecord};

/// Annotation on an `Ingress` naming the ingress controller it is fronted
/// by, if any.
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";
/// Annotation on a controller-fronting `Service` naming the key other
/// ingresses reference via [`INGRESS_CLASS_ANNOTATION`].
pub const INGRESS_CONTROLLER_ANNOTATION: &str = "route-ing-ctrl";

/// The canonical cluster model. Single writer: the Watch Multiplexer, via
/// exactly one of the three `update_*` methods per event.
#[derive(Debug, Default)]
pub struct ClusterView {
    ingresses: HashMap<String, IngressRecord>,
    nodes: HashMap<String, NodeRecord>,
    controllers: HashMap<String, ControllerRecord>,
}

impl ClusterView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch an `Ingress` watch event. Panics on a structural invariant
    /// violation (duplicate `Added`, or `Modified` of an absent key). These
    /// indicate the orchestrator sent events out of order and are treated
    /// as fatal.
    pub fn update_ingress(&mut self, ingress: &Ingress, kind: EventKind) -> RouteChange {
        let key = record::ingress_key(ingress);
        let incoming = IngressRecord::from_resource(ingress);
        match kind {
            EventKind::Added => {
                if self.ingresses.contains_key(&key) {
                    panic!("{}", ViewError::DuplicateIngress(key));
                }
                let changed = self.routes_for_ingress(&incoming);
                self.ingresses.insert(key, incoming);
                RouteChange {
                    deleted: Vec::new(),
                    changed,
                }
            }
            EventKind::Modified => {
                let Some(existing) = self.ingresses.get(&key).cloned() else {
                    panic!("{}", ViewError::UnknownIngressModified(key));
                };
                if existing == incoming {
                    return RouteChange::empty();
                }
                let deleted = self.routes_for_ingress(&existing);
                let changed = self.routes_for_ingress(&incoming);
                self.ingresses.insert(key, incoming);
                RouteChange { deleted, changed }
            }
            EventKind::Deleted => {
                self.ingresses.remove(&key);
                let deleted = self.routes_for_ingress(&incoming);
                RouteChange {
                    deleted,
                    changed: Vec::new(),
                }
            }
        }
    }

    /// Dispatch a `Node` watch event. Panics on duplicate `Added` or
    /// `Modified` of an absent key; `Deleted` is tolerant of an absent key.
    pub fn update_node(&mut self, node: &Node, kind: EventKind) -> RouteChange {
        let key = record::node_key(node);
        let incoming = NodeRecord::from_resource(node);
        match kind {
            EventKind::Added => {
                if self.nodes.contains_key(&key) {
                    panic!("{}", ViewError::DuplicateNode(key));
                }
                self.nodes.insert(key, incoming);
            }
            EventKind::Modified => {
                let Some(existing) = self.nodes.get(&key) else {
                    panic!("{}", ViewError::UnknownNodeModified(key));
                };
                if *existing == incoming {
                    return RouteChange::empty();
                }
                self.nodes.insert(key, incoming);
            }
            EventKind::Deleted => {
                self.nodes.remove(&key);
            }
        }
        RouteChange {
            deleted: Vec::new(),
            changed: self.routes_for_all_direct_hostnames(),
        }
    }

    /// Dispatch a watch event on a `Service` fronting an ingress controller.
    /// Services without the controller annotation are ignored. Panics on
    /// duplicate `Added` or `Deleted` of an absent key. `Modified` is
    /// intentionally not handled (the alias hostname is latched at `Added`
    /// time; reconciling a controller IP change requires an external
    /// restart).
    pub fn update_ing_ctrl_svc(&mut self, service: &Service, kind: EventKind) -> RouteChange {
        let Some(key) = record::controller_key(service) else {
            return RouteChange::empty();
        };
        match kind {
            EventKind::Added => {
                if self.controllers.contains_key(&key) {
                    panic!("{}", ViewError::DuplicateController(key));
                }
                let record = ControllerRecord::from_resource(service, key.clone());
                self.controllers.insert(key.clone(), record);
                RouteChange {
                    deleted: Vec::new(),
                    changed: self.routes_for_controller(&key),
                }
            }
            EventKind::Deleted => {
                let Some(removed) = self.controllers.remove(&key) else {
                    panic!("{}", ViewError::UnknownControllerDeleted(key));
                };
                let deleted = self.routes_for_hostnames(
                    &self.aliased_hostnames_for(&key),
                    &Route::AAlias(removed.lb_hostname),
                );
                RouteChange {
                    deleted,
                    changed: Vec::new(),
                }
            }
            EventKind::Modified => RouteChange::empty(),
        }
    }

    /// Partition an ingress's hostnames into direct vs. aliased and compute
    /// routes for each, given the view's current node/controller state.
    fn routes_for_ingress(&self, ingress: &IngressRecord) -> Vec<RouteEntry> {
        match ingress
            .ingress_class
            .as_ref()
            .and_then(|class| self.controllers.get(class))
        {
            Some(controller) => self.routes_for_hostnames(
                &ingress.hostnames,
                &Route::AAlias(controller.lb_hostname.clone()),
            ),
            None => {
                let ips = self.node_external_ips();
                if ips.is_empty() {
                    Vec::new()
                } else {
                    self.routes_for_hostnames(&ingress.hostnames, &Route::AIps(ips))
                }
            }
        }
    }

    /// Build one [`RouteEntry`] per hostname with the given payload, unless
    /// the hostname is empty (discarded per the ingress-rule edge case).
    fn routes_for_hostnames(&self, hostnames: &[String], route: &Route) -> Vec<RouteEntry> {
        hostnames
            .iter()
            .filter(|h| !h.is_empty())
            .map(|h| RouteEntry::new(h.clone(), route.clone()))
            .collect()
    }

    /// Recompute routes for every *direct* hostname (no class, or class
    /// names an unknown controller) against the current node set. Used when
    /// a node event fires: stale A-records converge via UPSERT, so there is
    /// no corresponding Deleted entry.
    fn routes_for_all_direct_hostnames(&self) -> Vec<RouteEntry> {
        let ips = self.node_external_ips();
        if ips.is_empty() {
            return Vec::new();
        }
        let mut changed = Vec::new();
        for ingress in self.ingresses.values() {
            if self.is_direct(ingress) {
                changed.extend(self.routes_for_hostnames(&ingress.hostnames, &Route::AIps(ips.clone())));
            }
        }
        changed
    }

    /// Routes for every hostname currently aliased to the named controller.
    fn routes_for_controller(&self, controller_key: &str) -> Vec<RouteEntry> {
        let Some(controller) = self.controllers.get(controller_key) else {
            return Vec::new();
        };
        self.routes_for_hostnames(
            &self.aliased_hostnames_for(controller_key),
            &Route::AAlias(controller.lb_hostname.clone()),
        )
    }

    fn aliased_hostnames_for(&self, controller_key: &str) -> Vec<String> {
        self.ingresses
            .values()
            .filter(|i| i.ingress_class.as_deref() == Some(controller_key))
            .flat_map(|i| i.hostnames.iter().cloned())
            .collect()
    }

    fn is_direct(&self, ingress: &IngressRecord) -> bool {
        match &ingress.ingress_class {
            None => true,
            Some(class) => !self.controllers.contains_key(class),
        }
    }

    fn node_external_ips(&self) -> Vec<String> {
        self.nodes
            .values()
            .map(|n| n.external_ip.clone())
            .filter(|ip| !ip.is_empty())
            .collect()
    }

    /// True if this ingress's `(namespace, name)` key is already known.
    /// Used by the Watch Multiplexer to tell a relisted "touched" event
    /// (which the orchestrator delivers for both first sight and updates)
    /// apart into `Added` vs `Modified`.
    pub fn has_ingress(&self, ingress: &Ingress) -> bool {
        self.ingresses.contains_key(&record::ingress_key(ingress))
    }

    /// True if this node's machine id is already known.
    pub fn has_node(&self, node: &Node) -> bool {
        self.nodes.contains_key(&record::node_key(node))
    }

    /// True if a controller is already tracked for this service's class
    /// annotation (or the service carries no class annotation at all, in
    /// which case it is never tracked).
    pub fn has_controller(&self, service: &Service) -> bool {
        record::controller_key(service)
            .map(|key| self.controllers.contains_key(&key))
            .unwrap_or(true)
    }

    #[cfg(test)]
    pub fn ingress_count(&self) -> usize {
        self.ingresses.len()
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }
}
