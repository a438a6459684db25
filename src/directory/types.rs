use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a `T` that implements `Default`, treating JSON `null` the same
/// as a missing field. Registries that encode empty lists as `null` are common.
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Health of a single host as last observed by the prober.
///
/// Serialized as `"active"`, `"inactive"` or `""` (never probed). Any other
/// string decodes to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum HostStatus {
    #[default]
    Unknown,
    Active,
    Inactive,
}

impl HostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::Unknown => "",
            HostStatus::Active => "active",
            HostStatus::Inactive => "inactive",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, HostStatus::Active)
    }
}

impl From<String> for HostStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => HostStatus::Active,
            "inactive" => HostStatus::Inactive,
            _ => HostStatus::Unknown,
        }
    }
}

impl From<HostStatus> for &'static str {
    fn from(status: HostStatus) -> Self {
        status.as_str()
    }
}

impl std::fmt::Display for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostStatus::Unknown => write!(f, "unknown"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// One network-addressable instance of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    #[serde(rename = "IP", alias = "ip")]
    pub address: String,

    #[serde(
        rename = "Status",
        alias = "status",
        default,
        deserialize_with = "deserialize_null_default"
    )]
    pub status: HostStatus,
}

impl HostEntry {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            status: HostStatus::Unknown,
        }
    }

    pub fn with_status(address: impl Into<String>, status: HostStatus) -> Self {
        Self {
            address: address.into(),
            status,
        }
    }

    /// `host:port` authority for this entry, bracketing bare IPv6 literals.
    pub fn authority(&self, port: u16) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, port)
        } else {
            format!("{}:{}", self.address, port)
        }
    }
}

/// All hosts answering for one logical service. Every host listens on `port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    #[serde(rename = "id")]
    pub name: String,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub hosts: Vec<HostEntry>,

    pub port: u16,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, hosts: Vec<HostEntry>, port: u16) -> Self {
        Self {
            name: name.into(),
            hosts,
            port,
        }
    }

    pub fn active_hosts(&self) -> impl Iterator<Item = &HostEntry> {
        self.hosts.iter().filter(|h| h.status.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_hosts().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_wire_shape() {
        let record = ServiceRecord::new(
            "svcA",
            vec![
                HostEntry::with_status("10.0.0.1", HostStatus::Active),
                HostEntry::new("10.0.0.2"),
            ],
            7777,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "svcA",
                "hosts": [
                    {"IP": "10.0.0.1", "Status": "active"},
                    {"IP": "10.0.0.2", "Status": ""}
                ],
                "port": 7777
            })
        );
    }

    #[test]
    fn test_decode_lowercase_keys() {
        let json = r#"{"id":"svcA","hosts":[{"ip":"10.0.0.1","status":"inactive"}],"port":80}"#;
        let record: ServiceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.hosts[0].address, "10.0.0.1");
        assert_eq!(record.hosts[0].status, HostStatus::Inactive);
    }

    #[test]
    fn test_decode_null_hosts_and_status() {
        let json = r#"{"id":"svcB","hosts":null,"port":80}"#;
        let record: ServiceRecord = serde_json::from_str(json).unwrap();
        assert!(record.hosts.is_empty());

        let json = r#"{"id":"svcC","hosts":[{"IP":"h1","Status":null},{"IP":"h2"}],"port":80}"#;
        let record: ServiceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.hosts[0].status, HostStatus::Unknown);
        assert_eq!(record.hosts[1].status, HostStatus::Unknown);
    }

    #[test]
    fn test_unrecognized_status_is_unknown() {
        let json = r#"{"IP":"h1","Status":"degraded"}"#;
        let host: HostEntry = serde_json::from_str(json).unwrap();
        assert_eq!(host.status, HostStatus::Unknown);
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let record = ServiceRecord::new(
            "orders",
            vec![
                HostEntry::with_status("10.0.0.1", HostStatus::Active),
                HostEntry::with_status("10.0.0.2", HostStatus::Inactive),
                HostEntry::new("10.0.0.3"),
            ],
            9000,
        );
        let encoded = serde_json::to_string(&vec![record.clone()]).unwrap();
        let decoded: Vec<ServiceRecord> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn test_authority() {
        assert_eq!(HostEntry::new("10.0.0.1").authority(7777), "10.0.0.1:7777");
        assert_eq!(HostEntry::new("svc-a.local").authority(80), "svc-a.local:80");
        assert_eq!(HostEntry::new("::1").authority(8080), "[::1]:8080");
    }

    #[test]
    fn test_active_hosts_filter() {
        let record = ServiceRecord::new(
            "svc",
            vec![
                HostEntry::with_status("a", HostStatus::Active),
                HostEntry::with_status("b", HostStatus::Inactive),
                HostEntry::new("c"),
                HostEntry::with_status("d", HostStatus::Active),
            ],
            80,
        );
        let active: Vec<&str> = record.active_hosts().map(|h| h.address.as_str()).collect();
        assert_eq!(active, vec!["a", "d"]);
        assert_eq!(record.active_count(), 2);
    }
}
