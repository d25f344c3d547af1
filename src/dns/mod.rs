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

//! The DNS synchronizer: applies [`RouteChange`]s against a hosted-zone API
//! idempotently, memoizing per-key route state so unchanged routes never
//! generate a provider call.

pub mod provider;
pub mod zone;

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Route, RouteChange};
use crate::error::SyncError;
use provider::{DnsProviderClient, RecordAction, RecordChangeRequest};

/// The last successfully applied shape of a route, keyed by
/// `(clientId, subdomain)`. A key exists iff the last provider call for it
/// succeeded.
#[derive(Debug, Clone)]
struct RouteSyncRecord {
    route: Route,
    zone_id: String,
    #[allow(dead_code)]
    apex: String,
    alias_target_zone_id: Option<String>,
}

/// Applies route deltas against a DNS provider. Owns the only writable copy
/// of the synchronizer's per-key state; the cluster view never reads it.
pub struct Synchronizer {
    provider: Arc<dyn DnsProviderClient>,
    dry_run: bool,
    records: HashMap<(String, String), RouteSyncRecord>,
}

impl Synchronizer {
    pub fn new(provider: Arc<dyn DnsProviderClient>, dry_run: bool) -> Self {
        Self {
            provider,
            dry_run,
            records: HashMap::new(),
        }
    }

    /// Apply a whole [`RouteChange`] as the Watch Multiplexer would: process
    /// deletions before additions, logging (not propagating) any transient
    /// error so that one bad route never blocks the rest of the batch.
    pub async fn apply(&mut self, change: &RouteChange) {
        let client_id = "";
        for entry in &change.deleted {
            if let Err(e) = self.remove_route(client_id, &entry.subdomain).await {
                log::warn!("failed to remove route for {}: {e}", entry.subdomain);
            }
        }
        for entry in &change.changed {
            if let Err(e) = self
                .add_route(client_id, &entry.subdomain, entry.route.clone())
                .await
            {
                log::warn!("failed to add route for {}: {e}", entry.subdomain);
            }
        }
        if change.is_empty() {
            log::info!("no changes to routes");
        }
    }

    /// Ensure an A (or alias) record exists for `subdomain` with `route`'s
    /// payload. A no-op (no provider call) if the requested route is
    /// structurally equal to the last applied one.
    pub async fn add_route(
        &mut self,
        client_id: &str,
        subdomain: &str,
        route: Route,
    ) -> Result<(), SyncError> {
        let key = (client_id.to_string(), subdomain.to_string());
        if let Some(existing) = self.records.get(&key) {
            if existing.route.payload_eq(&route) {
                return Ok(());
            }
        }

        if self.dry_run {
            let apex = zone::tld(subdomain)?;
            log::info!("DRY RUN: would upsert {subdomain} -> {route:?}");
            self.records.insert(
                key,
                RouteSyncRecord {
                    route,
                    zone_id: String::new(),
                    apex,
                    alias_target_zone_id: None,
                },
            );
            return Ok(());
        }

        let apex = zone::tld(subdomain)?;
        let zones = self.provider.list_hosted_zones_by_name(&apex).await?;
        let zone = zone::find_most_specific(subdomain, &zones)?.clone();

        let alias_target_zone_id = match &route {
            Route::AAlias(hostname) => Some(self.resolve_alias_target_zone(hostname).await?),
            Route::AIps(_) => None,
        };

        let request = RecordChangeRequest {
            action: RecordAction::Upsert,
            name: zone::with_trailing_dot(subdomain),
            route: route.clone(),
            alias_target_zone_id: alias_target_zone_id.clone(),
        };
        self.provider
            .change_resource_record_sets(&zone.id, &request)
            .await?;

        self.records.insert(
            key,
            RouteSyncRecord {
                route,
                zone_id: zone.id,
                apex,
                alias_target_zone_id,
            },
        );
        Ok(())
    }

    /// Delete the record for `subdomain`. Errors if no route was ever
    /// successfully applied for this key.
    pub async fn remove_route(&mut self, client_id: &str, subdomain: &str) -> Result<(), SyncError> {
        let key = (client_id.to_string(), subdomain.to_string());
        let Some(existing) = self.records.get(&key) else {
            return Err(SyncError::RouteNotFound {
                client_id: client_id.to_string(),
                subdomain: subdomain.to_string(),
            });
        };

        if self.dry_run {
            log::info!("DRY RUN: would delete {subdomain}");
            self.records.remove(&key);
            return Ok(());
        }

        let request = RecordChangeRequest {
            action: RecordAction::Delete,
            name: zone::with_trailing_dot(subdomain),
            route: existing.route.clone(),
            alias_target_zone_id: existing.alias_target_zone_id.clone(),
        };
        self.provider
            .change_resource_record_sets(&existing.zone_id, &request)
            .await?;
        self.records.remove(&key);
        Ok(())
    }

    /// Resolve the hosted zone id backing an alias target's own hostname.
    /// The load balancer's canonical hosted zone id is not something the
    /// cluster watch streams report, so it is discovered the same way a
    /// subdomain's own zone is: by listing hosted zones for the target's
    /// apex and picking the most specific match.
    async fn resolve_alias_target_zone(&self, target_hostname: &str) -> Result<String, SyncError> {
        let apex = zone::tld(target_hostname)?;
        let zones = self.provider.list_hosted_zones_by_name(&apex).await?;
        Ok(zone::find_most_specific(target_hostname, &zones)?.id.clone())
    }

    #[cfg(test)]
    fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::zone::HostedZoneInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProvider {
        zones: HashMap<String, Vec<HostedZoneInfo>>,
        calls: Mutex<Vec<(String, RecordAction)>>,
        fail_next: Mutex<bool>,
    }

    impl FakeProvider {
        fn with_zone(apex: &str, zone_id: &str, zone_name: &str) -> Self {
            let mut zones = HashMap::new();
            zones.insert(
                apex.to_string(),
                vec![HostedZoneInfo {
                    id: zone_id.to_string(),
                    name: zone_name.to_string(),
                }],
            );
            Self {
                zones,
                calls: Mutex::new(Vec::new()),
                fail_next: Mutex::new(false),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl DnsProviderClient for FakeProvider {
        async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZoneInfo>, SyncError> {
            Ok(self.zones.get(dns_name).cloned().unwrap_or_default())
        }

        async fn change_resource_record_sets(
            &self,
            zone_id: &str,
            change: &RecordChangeRequest,
        ) -> Result<(), SyncError> {
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(SyncError::Provider("boom".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push((zone_id.to_string(), change.action));
            Ok(())
        }
    }

    fn synchronizer(provider: FakeProvider, dry_run: bool) -> (Arc<FakeProvider>, Synchronizer) {
        let provider = Arc::new(provider);
        let sync = Synchronizer::new(provider.clone() as Arc<dyn DnsProviderClient>, dry_run);
        (provider, sync)
    }

    #[tokio::test]
    async fn add_route_issues_one_upsert() {
        let (provider, mut sync) = synchronizer(FakeProvider::with_zone("y.z", "Z1", "y.z."), false);
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 1);
        assert_eq!(sync.record_count(), 1);
    }

    #[tokio::test]
    async fn repeated_identical_add_route_dedups() {
        let (provider, mut sync) = synchronizer(FakeProvider::with_zone("y.z", "Z1", "y.z."), false);
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap();
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn add_route_dedups_ip_set_regardless_of_order() {
        let (provider, mut sync) = synchronizer(FakeProvider::with_zone("y.z", "Z1", "y.z."), false);
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into(), "10.0.0.2".into()]))
            .await
            .unwrap();
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.2".into(), "10.0.0.1".into()]))
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn add_remove_add_issues_three_calls() {
        let (provider, mut sync) = synchronizer(FakeProvider::with_zone("y.z", "Z1", "y.z."), false);
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap();
        sync.remove_route("", "x.y.z").await.unwrap();
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn remove_route_without_prior_add_fails() {
        let (_provider, mut sync) = synchronizer(FakeProvider::with_zone("y.z", "Z1", "y.z."), false);
        let err = sync.remove_route("", "x.y.z").await.unwrap_err();
        assert!(matches!(err, SyncError::RouteNotFound { .. }));
    }

    #[tokio::test]
    async fn dry_run_never_calls_provider_but_still_dedups() {
        let (provider, mut sync) = synchronizer(FakeProvider::with_zone("y.z", "Z1", "y.z."), true);
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap();
        sync.add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 0);
        assert_eq!(sync.record_count(), 1);
    }

    #[tokio::test]
    async fn provider_error_leaves_state_unchanged() {
        let provider = FakeProvider::with_zone("y.z", "Z1", "y.z.");
        *provider.fail_next.lock().unwrap() = true;
        let (provider, mut sync) = synchronizer(provider, false);
        let err = sync
            .add_route("", "x.y.z", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Provider(_)));
        assert_eq!(sync.record_count(), 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn invalid_domain_is_rejected_before_any_provider_call() {
        let (provider, mut sync) = synchronizer(FakeProvider::default(), false);
        let err = sync
            .add_route("", "a.b", Route::AIps(vec!["10.0.0.1".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidDomain(_)));
        assert_eq!(provider.call_count(), 0);
    }
}
