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

//! Record types stored in the [`super::ClusterView`]'s maps, and the
//! key/parsing functions used to build them from Kubernetes objects.

use k8s_openapi::api::core::v1::{Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;

use super::{INGRESS_CLASS_ANNOTATION, INGRESS_CONTROLLER_ANNOTATION};

/// `(namespace, name)` identifies an `Ingress`.
pub fn ingress_key(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.namespace().unwrap_or_default(),
        ingress.name_any()
    )
}

/// The stable machine identifier identifies a `Node`.
pub fn node_key(node: &Node) -> String {
    node.status
        .as_ref()
        .and_then(|s| s.node_info.as_ref())
        .map(|info| info.machine_id.clone())
        .unwrap_or_default()
}

/// The ingress-class annotation value identifies an ingress controller.
/// Services without the annotation are not tracked.
pub fn controller_key(service: &Service) -> Option<String> {
    service
        .annotations()
        .get(INGRESS_CONTROLLER_ANNOTATION)
        .cloned()
}

/// An ingress's hostnames and optional reference to an ingress controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRecord {
    pub namespace: String,
    pub name: String,
    pub hostnames: Vec<String>,
    pub ingress_class: Option<String>,
}

impl IngressRecord {
    pub fn from_resource(ingress: &Ingress) -> Self {
        let hostnames = ingress
            .spec
            .as_ref()
            .and_then(|s| s.rules.as_ref())
            .map(|rules| {
                rules
                    .iter()
                    .filter_map(|rule| rule.host.clone())
                    .collect()
            })
            .unwrap_or_default();
        let ingress_class = ingress.annotations().get(INGRESS_CLASS_ANNOTATION).cloned();
        Self {
            namespace: ingress.namespace().unwrap_or_default(),
            name: ingress.name_any(),
            hostnames,
            ingress_class,
        }
    }
}

/// A node's external IP, chosen from its reported address list. Empty when
/// no address is tagged `ExternalIP` (the node is retained but contributes
/// nothing to routes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub machine_id: String,
    pub external_ip: String,
}

impl NodeRecord {
    pub fn from_resource(node: &Node) -> Self {
        let external_ip = node
            .status
            .as_ref()
            .and_then(|s| s.addresses.as_ref())
            .and_then(|addresses| {
                addresses
                    .iter()
                    .find(|addr| addr.type_ == "ExternalIP")
                    .map(|addr| addr.address.clone())
            })
            .unwrap_or_default();
        Self {
            machine_id: node_key(node),
            external_ip,
        }
    }
}

/// An ingress controller, identified by the value of the class annotation
/// its fronting `Service` carries. Latched at `Added` time: `Modified`
/// events on the service are not tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRecord {
    /// The annotation value other ingresses reference (the map key).
    pub key: String,
    /// Hostname of the fronting load balancer, taken from the first entry
    /// of the service's load-balancer status.
    pub lb_hostname: String,
}

impl ControllerRecord {
    pub fn from_resource(service: &Service, key: String) -> Self {
        let lb_hostname = service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.hostname.clone())
            .unwrap_or_default();
        Self { key, lb_hostname }
    }
}

#[cfg(test)]
pub mod test_support {
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, Node, NodeAddress, NodeStatus, NodeSystemInfo,
        Service, ServiceStatus,
    };
    use k8s_openapi::api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressSpec,
        IngressServiceBackend,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    pub fn ingress(namespace: &str, name: &str, class: Option<&str>, hosts: &[&str]) -> Ingress {
        let mut annotations = BTreeMap::new();
        if let Some(class) = class {
            annotations.insert(super::INGRESS_CLASS_ANNOTATION.to_string(), class.to_string());
        }
        let rules = hosts
            .iter()
            .map(|host| IngressRule {
                host: if host.is_empty() {
                    None
                } else {
                    Some(host.to_string())
                },
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".into()),
                        path_type: "Prefix".into(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: "svc".into(),
                                port: None,
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            })
            .collect();
        Ingress {
            metadata: ObjectMeta {
                namespace: Some(namespace.into()),
                name: Some(name.into()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(rules),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn node(machine_id: &str, external_ip: Option<&str>) -> Node {
        let addresses = external_ip.map(|ip| {
            vec![NodeAddress {
                type_: "ExternalIP".into(),
                address: ip.into(),
            }]
        });
        Node {
            status: Some(NodeStatus {
                addresses,
                node_info: Some(NodeSystemInfo {
                    machine_id: machine_id.into(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn controller_service(name: &str, class_key: &str, lb_hostname: Option<&str>) -> Service {
        let mut annotations = BTreeMap::new();
        annotations.insert(
            super::INGRESS_CONTROLLER_ANNOTATION.to_string(),
            class_key.to_string(),
        );
        Service {
            metadata: ObjectMeta {
                namespace: Some("kube-system".into()),
                name: Some(name.into()),
                annotations: Some(annotations),
                ..Default::default()
            },
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: lb_hostname.map(|hostname| {
                        vec![LoadBalancerIngress {
                            hostname: Some(hostname.into()),
                            ..Default::default()
                        }]
                    }),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn controller_service_no_class(name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                namespace: Some("kube-system".into()),
                name: Some(name.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
