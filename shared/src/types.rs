use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::protocol::{CANDIDATE_LAN, CANDIDATE_LOCALHOST, CANDIDATE_TAILSCALE, LOOPBACK_ADDR};

/// A local TCP service checked for reachability.
/// Built once from the service catalog at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Unique short key, e.g. "camreview"
    pub key: String,

    /// Display name, e.g. "CamReview"
    pub name: String,

    /// TCP port, already resolved from the "self" sentinel
    pub port: u16,

    /// Path the UI links to; never probed
    pub path: String,

    /// Source repository shown next to the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

/// Addresses found by discovery. Empty string means unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredAddresses {
    pub tailscale: String,
    pub lan: String,
}

/// Pass-through metadata for the UI footer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub repo_url: String,
    pub telegram_username: String,
}

/// One address that every service gets probed against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCandidate {
    pub key: &'static str,
    pub label: &'static str,
    pub address: String,
}

impl HostCandidate {
    /// Builds the candidate list in display order: overlay, LAN, loopback.
    /// Candidates without an address are left out; loopback is always present.
    pub fn from_addresses(ips: &DiscoveredAddresses) -> Vec<HostCandidate> {
        [
            (CANDIDATE_TAILSCALE, "Tailscale", ips.tailscale.as_str()),
            (CANDIDATE_LAN, "LAN", ips.lan.as_str()),
            (CANDIDATE_LOCALHOST, "Localhost", LOOPBACK_ADDR),
        ]
        .into_iter()
        .filter(|(_, _, address)| !address.is_empty())
        .map(|(key, label, address)| HostCandidate {
            key,
            label,
            address: address.to_string(),
        })
        .collect()
    }
}

/// Reachability of one (candidate, service) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub ok: bool,
}

/// Candidate key -> service key -> result, kept in insertion order so the
/// UI renders rows and columns the way they were configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachabilityMatrix {
    rows: Vec<(String, Vec<(String, ProbeResult)>)>,
}

impl ReachabilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty row for a candidate. No-op if the row exists.
    pub fn insert_candidate(&mut self, candidate: &str) {
        if !self.rows.iter().any(|(key, _)| key == candidate) {
            self.rows.push((candidate.to_string(), Vec::new()));
        }
    }

    /// Records a result, creating the candidate row if needed.
    /// A second result for the same pair replaces the first.
    pub fn record(&mut self, candidate: &str, service: &str, ok: bool) {
        self.insert_candidate(candidate);
        let Some((_, row)) = self.rows.iter_mut().find(|(key, _)| key == candidate) else {
            return;
        };
        match row.iter_mut().find(|(key, _)| key == service) {
            Some((_, result)) => result.ok = ok,
            None => row.push((service.to_string(), ProbeResult { ok })),
        }
    }

    /// Result for one pair, `None` if that pair was never recorded
    pub fn get(&self, candidate: &str, service: &str) -> Option<ProbeResult> {
        self.row(candidate)?
            .iter()
            .find(|(key, _)| key == service)
            .map(|(_, result)| *result)
    }

    /// All results for a candidate in service order.
    /// `None` when the candidate had no address and was left out.
    pub fn row(&self, candidate: &str) -> Option<&[(String, ProbeResult)]> {
        self.rows
            .iter()
            .find(|(key, _)| key == candidate)
            .map(|(_, row)| row.as_slice())
    }

    /// Candidate keys in display order
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(key, _)| key.as_str())
    }

    /// Number of recorded (candidate, service) pairs
    pub fn len(&self) -> usize {
        self.rows.iter().map(|(_, row)| row.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Row<'a>(&'a [(String, ProbeResult)]);

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (service, result) in self.0 {
            map.serialize_entry(service, result)?;
        }
        map.end()
    }
}

impl Serialize for ReachabilityMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (candidate, row) in &self.rows {
            map.serialize_entry(candidate, &Row(row))?;
        }
        map.end()
    }
}

/// Body of `GET /api/status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,

    #[serde(serialize_with = "serialize_iso8601")]
    pub updated_at: DateTime<Utc>,

    pub ips: DiscoveredAddresses,
    pub services: Vec<Service>,
    pub results: ReachabilityMatrix,
    pub meta: Meta,
}

/// Millisecond precision with a `Z` suffix, e.g. "2026-10-16T09:47:00.123Z"
fn serialize_iso8601<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_service(key: &str, port: u16) -> Service {
        Service {
            key: key.to_string(),
            name: key.to_uppercase(),
            port,
            path: "/".to_string(),
            repo_url: None,
        }
    }

    #[test]
    fn test_candidates_skip_empty_addresses() {
        let ips = DiscoveredAddresses {
            tailscale: String::new(),
            lan: "192.168.1.50".to_string(),
        };

        let keys: Vec<&str> = HostCandidate::from_addresses(&ips)
            .iter()
            .map(|c| c.key)
            .collect();

        assert_eq!(keys, vec!["lan", "localhost"]);
    }

    #[test]
    fn test_loopback_candidate_always_present() {
        let candidates = HostCandidate::from_addresses(&DiscoveredAddresses::default());

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key, CANDIDATE_LOCALHOST);
        assert_eq!(candidates[0].address, LOOPBACK_ADDR);
    }

    #[test]
    fn test_matrix_serializes_in_insertion_order() {
        let mut matrix = ReachabilityMatrix::new();
        matrix.record("tailscale", "zeta", true);
        matrix.record("tailscale", "alpha", false);
        matrix.insert_candidate("localhost");

        let json = serde_json::to_string(&matrix).unwrap();
        assert_eq!(
            json,
            r#"{"tailscale":{"zeta":{"ok":true},"alpha":{"ok":false}},"localhost":{}}"#
        );
        assert_eq!(matrix.len(), 2);
    }

    #[test]
    fn test_matrix_record_replaces_existing_pair() {
        let mut matrix = ReachabilityMatrix::new();
        matrix.record("lan", "web", false);
        matrix.record("lan", "web", true);

        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.get("lan", "web"), Some(ProbeResult { ok: true }));
        assert_eq!(matrix.get("lan", "missing"), None);
    }

    #[test]
    fn test_matrix_lookups() {
        let mut matrix = ReachabilityMatrix::new();
        matrix.record("lan", "web", true);
        matrix.record("lan", "db", false);
        matrix.insert_candidate("localhost");

        assert_eq!(matrix.candidates().collect::<Vec<_>>(), vec!["lan", "localhost"]);
        assert_eq!(
            matrix.row("lan"),
            Some(
                &[
                    ("web".to_string(), ProbeResult { ok: true }),
                    ("db".to_string(), ProbeResult { ok: false }),
                ][..]
            )
        );
        assert_eq!(matrix.row("localhost").map(|r| r.len()), Some(0));
        assert_eq!(matrix.row("tailscale"), None);
        assert_eq!(matrix.get("lan", "db"), Some(ProbeResult { ok: false }));
        assert_eq!(matrix.get("tailscale", "web"), None);
    }

    #[test]
    fn test_status_response_wire_format() {
        let mut service = test_service("web", 3000);
        service.repo_url = Some("https://example.com/web".to_string());

        let mut results = ReachabilityMatrix::new();
        results.record("localhost", "web", true);

        let response = StatusResponse {
            success: true,
            updated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            ips: DiscoveredAddresses::default(),
            services: vec![service, test_service("db", 5432)],
            results,
            meta: Meta {
                repo_url: "https://example.com/dash".to_string(),
                telegram_username: "homelab".to_string(),
            },
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["updatedAt"], "2026-01-02T03:04:05.000Z");
        assert_eq!(value["ips"]["tailscale"], "");
        assert_eq!(value["services"][0]["repoUrl"], "https://example.com/web");
        assert!(value["services"][1].get("repoUrl").is_none());
        assert_eq!(value["results"]["localhost"]["web"]["ok"], true);
        assert_eq!(value["meta"]["telegramUsername"], "homelab");
    }
}
