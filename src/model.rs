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

//! Shared route types produced by the cluster view and consumed by the
//! DNS synchronizer.

use std::collections::HashSet;

/// A DNS route, derived from the cluster view. Never stored by the view
/// itself; it is recomputed on every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Direct A-record(s) pointing at the external IPs of known nodes.
    AIps(Vec<String>),
    /// Alias record pointing at an ingress controller's load balancer.
    AAlias(String),
}

impl Route {
    /// Structural equality used for synchronizer dedup: IP routes compare as
    /// sets (order carries no meaning for "has this changed"), alias routes
    /// compare as strings.
    pub fn payload_eq(&self, other: &Route) -> bool {
        match (self, other) {
            (Route::AIps(a), Route::AIps(b)) => {
                let a: HashSet<&String> = a.iter().collect();
                let b: HashSet<&String> = b.iter().collect();
                a == b
            }
            (Route::AAlias(a), Route::AAlias(b)) => a == b,
            _ => false,
        }
    }
}

/// A single subdomain paired with the route it should have (Changed) or did
/// have (Deleted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub subdomain: String,
    pub route: Route,
}

impl RouteEntry {
    pub fn new(subdomain: impl Into<String>, route: Route) -> Self {
        Self {
            subdomain: subdomain.into(),
            route,
        }
    }
}

/// The delta a single cluster event produces. An empty `RouteChange` (both
/// lists empty) means the event was a no-op as far as DNS is concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteChange {
    pub deleted: Vec<RouteEntry>,
    pub changed: Vec<RouteEntry>,
}

impl RouteChange {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.changed.is_empty()
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Mirrors the orchestrator's watch event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}
