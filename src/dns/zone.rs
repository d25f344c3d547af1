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

//! Pure FQDN/zone-name arithmetic: apex extraction and most-specific-zone
//! selection. No provider I/O lives here.

use crate::error::SyncError;

/// Information about a hosted zone as reported by the provider's "list
/// hosted zones by name" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZoneInfo {
    pub id: String,
    /// Trailing-dot form, e.g. `"example.com."`.
    pub name: String,
}

/// Extract the apex (last two labels) of a fully-qualified domain name.
/// Domains with fewer than three labels are rejected as invalid input.
pub fn tld(fqdn: &str) -> Result<String, SyncError> {
    let trimmed = fqdn.trim_end_matches('.');
    let labels: Vec<&str> = trimmed.split('.').collect();
    if labels.len() < 3 {
        return Err(SyncError::InvalidDomain(fqdn.to_string()));
    }
    Ok(labels[labels.len() - 2..].join("."))
}

/// Normalize a domain name to its trailing-dot form.
pub fn with_trailing_dot(domain: &str) -> String {
    if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{domain}.")
    }
}

/// Among the given hosted zones, pick the one whose name is the longest
/// suffix match of `fqdn` (either exactly equal, or `fqdn` ends in
/// `.zoneName`). Ties are broken by longest zone name; an empty zone list or
/// no match is an error.
pub fn find_most_specific<'a>(
    fqdn: &str,
    zones: &'a [HostedZoneInfo],
) -> Result<&'a HostedZoneInfo, SyncError> {
    let fqdn = with_trailing_dot(fqdn);
    if zones.is_empty() {
        return Err(SyncError::NoZoneFound(fqdn));
    }
    zones
        .iter()
        .filter(|zone| fqdn == zone.name || fqdn.ends_with(&format!(".{}", zone.name)))
        .max_by_key(|zone| zone.name.len())
        .ok_or(SyncError::NoZoneFound(fqdn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tld_joins_last_two_labels() {
        assert_eq!(tld("x.y.z").unwrap(), "y.z");
        assert_eq!(tld("a.b.c.d").unwrap(), "c.d");
        assert_eq!(tld("a.b.c.d.").unwrap(), "c.d");
    }

    #[test]
    fn tld_rejects_short_domains() {
        assert!(tld("a.b").is_err());
        assert!(tld("a").is_err());
    }

    #[test]
    fn find_most_specific_prefers_longest_match() {
        let zones = vec![
            HostedZoneInfo { id: "1".into(), name: "y.z.".into() },
            HostedZoneInfo { id: "2".into(), name: "x.y.z.".into() },
        ];
        let found = find_most_specific("x.y.z", &zones).unwrap();
        assert_eq!(found.id, "2");
    }

    #[test]
    fn find_most_specific_matches_exact_zone() {
        let zones = vec![HostedZoneInfo { id: "1".into(), name: "y.z.".into() }];
        let found = find_most_specific("y.z", &zones).unwrap();
        assert_eq!(found.id, "1");
    }

    #[test]
    fn find_most_specific_rejects_non_suffix() {
        let zones = vec![HostedZoneInfo { id: "1".into(), name: "other.com.".into() }];
        assert!(find_most_specific("x.y.z", &zones).is_err());
    }

    #[test]
    fn find_most_specific_rejects_empty_zone_list() {
        assert!(find_most_specific("x.y.z", &[]).is_err());
    }
}
