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

//! Typed errors for the three failure kinds this system distinguishes:
//! bootstrap, structural invariant violations, and transient operational
//! errors.

use thiserror::Error;

/// Fatal at startup: invalid credentials, or a watch stream could not be
/// subscribed to.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to infer Kubernetes client config: {0}")]
    KubeConfigInfer(#[source] kube::config::InferConfigError),
    #[error("failed to build Kubernetes client config from kubeconfig: {0}")]
    KubeConfig(#[source] kube::config::KubeconfigError),
    #[error("failed to construct Kubernetes client: {0}")]
    KubeClient(#[source] kube::Error),
    #[error("failed to build DNS provider client: {0}")]
    DnsProvider(String),
    #[error("failed to read kubeconfig file {path}: {source}")]
    KubeconfigFile {
        path: String,
        #[source]
        source: kube::config::KubeconfigError,
    },
}

/// A structural inconsistency in the cluster view: a duplicate `Added`, or a
/// `Modified`/`Deleted` of an entity that was never added. These indicate an
/// upstream protocol violation and are treated as fatal programmer errors.
/// Callers raise them as panics (see `cluster_view`), but the typed variant
/// is kept so tests can assert on *which* invariant was violated via
/// `std::panic::catch_unwind`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("ingress {0} already exists")]
    DuplicateIngress(String),
    #[error("ingress {0} modified but does not exist")]
    UnknownIngressModified(String),
    #[error("node {0} already exists")]
    DuplicateNode(String),
    #[error("node {0} modified but does not exist")]
    UnknownNodeModified(String),
    #[error("ingress controller {0} already exists")]
    DuplicateController(String),
    #[error("ingress controller {0} deleted but does not exist")]
    UnknownControllerDeleted(String),
}

/// Transient operational errors: zone lookup failure, an invalid FQDN, a
/// provider API error, or removal of a route that was never added. Logged at
/// warning level by the caller and never retried directly; the next
/// matching cluster event regenerates the same change.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("domain {0} is invalid: expected a fully qualified domain name of at least 3 labels")]
    InvalidDomain(String),
    #[error("no hosted zone found for domain {0}")]
    NoZoneFound(String),
    #[error("DNS provider error: {0}")]
    Provider(String),
    #[error("route for {client_id}/{subdomain} does not exist")]
    RouteNotFound { client_id: String, subdomain: String },
}
