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

//! The DNS provider seam. A trait keeps the synchronizer's idempotence and
//! zone-resolution logic testable against an in-memory fake instead of real
//! AWS calls; [`Route53Client`] is the production implementation.

use async_trait::async_trait;
use aws_sdk_route53::types::{
    AliasTarget, Change, ChangeAction, ChangeBatch, RrType, ResourceRecord, ResourceRecordSet,
};
use aws_sdk_route53::Client as AwsRoute53Client;

use crate::dns::zone::HostedZoneInfo;
use crate::error::SyncError;
use crate::model::Route;

/// TTL applied to A-records with an explicit IP list. Alias records carry no
/// explicit TTL.
pub const RECORD_TTL_SECONDS: i64 = 300;
/// Comment attached to every change batch, identifying this controller.
pub const CHANGE_COMMENT: &str = "cluster-dns-reconciler";

/// A single record change to submit as a one-item change batch.
#[derive(Debug, Clone)]
pub struct RecordChangeRequest {
    pub action: RecordAction,
    pub name: String,
    pub route: Route,
    /// Resolved hosted zone id of the alias target, when `route` is an
    /// alias. Unused for `Route::AIps`.
    pub alias_target_zone_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    Upsert,
    Delete,
}

/// Abstraction over the provider's two operations: zone discovery and
/// change-batch submission.
#[async_trait]
pub trait DnsProviderClient: Send + Sync {
    async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZoneInfo>, SyncError>;
    async fn change_resource_record_sets(
        &self,
        zone_id: &str,
        change: &RecordChangeRequest,
    ) -> Result<(), SyncError>;
}

/// Production implementation backed by `aws-sdk-route53`.
pub struct Route53Client {
    client: AwsRoute53Client,
}

impl Route53Client {
    pub fn new(client: AwsRoute53Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(AwsRoute53Client::new(&config))
    }
}

#[async_trait]
impl DnsProviderClient for Route53Client {
    async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZoneInfo>, SyncError> {
        let out = self
            .client
            .list_hosted_zones_by_name()
            .dns_name(dns_name)
            .send()
            .await
            .map_err(|e| SyncError::Provider(format!("ListHostedZonesByName({dns_name}): {e}")))?;
        Ok(out
            .hosted_zones()
            .iter()
            .map(|zone| HostedZoneInfo {
                id: zone.id().to_string(),
                name: zone.name().to_string(),
            })
            .collect())
    }

    async fn change_resource_record_sets(
        &self,
        zone_id: &str,
        change: &RecordChangeRequest,
    ) -> Result<(), SyncError> {
        let record_set = build_record_set(change)?;
        let aws_action = match change.action {
            RecordAction::Upsert => ChangeAction::Upsert,
            RecordAction::Delete => ChangeAction::Delete,
        };
        let aws_change = Change::builder()
            .action(aws_action)
            .resource_record_set(record_set)
            .build()
            .map_err(|e| SyncError::Provider(e.to_string()))?;
        let batch = ChangeBatch::builder()
            .comment(CHANGE_COMMENT)
            .changes(aws_change)
            .build()
            .map_err(|e| SyncError::Provider(e.to_string()))?;
        self.client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| SyncError::Provider(format!("ChangeResourceRecordSets({zone_id}): {e}")))?;
        Ok(())
    }
}

fn build_record_set(change: &RecordChangeRequest) -> Result<ResourceRecordSet, SyncError> {
    let builder = ResourceRecordSet::builder()
        .name(&change.name)
        .r#type(RrType::A);
    let builder = match &change.route {
        Route::AIps(ips) => {
            let mut builder = builder.ttl(RECORD_TTL_SECONDS);
            for ip in ips {
                builder = builder.resource_records(ResourceRecord::builder().value(ip).build().map_err(|e| SyncError::Provider(e.to_string()))?);
            }
            builder
        }
        Route::AAlias(hostname) => {
            let target_zone_id = change
                .alias_target_zone_id
                .clone()
                .ok_or_else(|| SyncError::Provider("alias route missing resolved target zone id".into()))?;
            let alias_target = AliasTarget::builder()
                .dns_name(hostname)
                .hosted_zone_id(target_zone_id)
                .evaluate_target_health(false)
                .build()
                .map_err(|e| SyncError::Provider(e.to_string()))?;
            builder.alias_target(alias_target)
        }
    };
    builder.build().map_err(|e| SyncError::Provider(e.to_string()))
}
