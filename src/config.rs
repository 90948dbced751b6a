use std::time::Duration;

use crate::error::{Result, StoreError};

// ============================================================================
// Store Configuration
// ============================================================================
//
// Everything the context needs to reach the store: how to route requests,
// where the cluster is, which keyspace/table hold the streams and how large
// the shared state cache may grow.
//
// ============================================================================

const DEFAULT_KEYSPACE: &str = "equinox";
const DEFAULT_TABLE: &str = "events";
const DEFAULT_CACHE_MB: u64 = 50;
const DEFAULT_PORT: u16 = 9042;

/// How requests are routed to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// Token-aware routing straight to a replica owning the stream
    #[default]
    Direct,
    /// Round-robin over coordinators, no token awareness
    Gateway,
}

impl ConnectionMode {
    pub fn is_token_aware(self) -> bool {
        matches!(self, ConnectionMode::Direct)
    }
}

impl std::str::FromStr for ConnectionMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ConnectionMode::Direct),
            "gateway" => Ok(ConnectionMode::Gateway),
            other => Err(StoreError::Config(format!("Unknown connection mode: {}", other))),
        }
    }
}

/// Connection configuration, constructed once and consumed by connect
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub mode: ConnectionMode,
    pub connection_string: String,
    /// Keyspace holding the stream table
    pub database: String,
    /// Table holding events, versions and snapshots
    pub collection: String,
    pub cache_mb: u64,
}

impl StoreConfig {
    pub fn new(
        mode: ConnectionMode,
        connection_string: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
        cache_mb: u64,
    ) -> Self {
        Self {
            mode,
            connection_string: connection_string.into(),
            database: database.into(),
            collection: collection.into(),
            cache_mb,
        }
    }

    /// Read configuration from `SCYLLA_MODE`, `SCYLLA_CONNECTION`,
    /// `SCYLLA_KEYSPACE`, `SCYLLA_TABLE` and `CACHE_MB`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = match lookup("SCYLLA_MODE") {
            Some(value) => value.parse()?,
            None => ConnectionMode::default(),
        };

        let connection_string = lookup("SCYLLA_CONNECTION")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| StoreError::Config("SCYLLA_CONNECTION is not set".to_string()))?;

        let cache_mb = match lookup("CACHE_MB") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e| StoreError::Config(format!("Invalid CACHE_MB '{}': {}", value, e)))?,
            None => DEFAULT_CACHE_MB,
        };

        Ok(Self {
            mode,
            connection_string,
            database: lookup("SCYLLA_KEYSPACE").unwrap_or_else(|| DEFAULT_KEYSPACE.to_string()),
            collection: lookup("SCYLLA_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            cache_mb,
        })
    }
}

// ============================================================================
// Connector Settings
// ============================================================================

/// Fixed request policy applied by the context when connecting
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorSettings {
    pub app_name: String,
    /// Applied per request, including retry attempts
    pub request_timeout: Duration,
    /// Retries before failing when the cluster throttles a request
    pub max_retries_on_throttling: u32,
    pub max_retry_wait: Duration,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        let timeout = Duration::from_secs(5);
        Self {
            app_name: "App".to_string(),
            request_timeout: timeout,
            max_retries_on_throttling: 1,
            max_retry_wait: Duration::from_secs(timeout.as_secs()),
        }
    }
}

// ============================================================================
// Discovery - connection string parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Where the cluster lives and how to authenticate against it
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub contact_points: Vec<String>,
    pub credentials: Option<Credentials>,
}

impl Discovery {
    /// Parse `ContactPoints=h1:9042,h2;Username=u;Password=p`, or a bare
    /// comma separated list of hosts. Hosts without a port get 9042.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let connection_string = connection_string.trim();
        if connection_string.is_empty() {
            return Err(StoreError::Config("Connection string is empty".to_string()));
        }

        if !connection_string.contains('=') {
            return Ok(Self {
                contact_points: parse_contact_points(connection_string)?,
                credentials: None,
            });
        }

        let mut contact_points = None;
        let mut username = None;
        let mut password = None;

        for part in connection_string.split(';').filter(|p| !p.trim().is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| StoreError::Config(format!("Malformed segment '{}'", part.trim())))?;
            let key: String = key
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();

            match key.as_str() {
                "contactpoints" | "hosts" => contact_points = Some(parse_contact_points(value)?),
                "username" | "user" => username = Some(value.trim().to_string()),
                "password" => password = Some(value.trim().to_string()),
                other => {
                    return Err(StoreError::Config(format!("Unknown connection setting '{}'", other)))
                }
            }
        }

        let contact_points = contact_points
            .ok_or_else(|| StoreError::Config("ContactPoints missing from connection string".to_string()))?;

        let credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            _ => {
                return Err(StoreError::Config(
                    "Username and Password must be supplied together".to_string(),
                ))
            }
        };

        Ok(Self { contact_points, credentials })
    }
}

fn parse_contact_points(value: &str) -> Result<Vec<String>> {
    let points: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.contains(':') {
                p.to_string()
            } else {
                format!("{}:{}", p, DEFAULT_PORT)
            }
        })
        .collect();

    if points.is_empty() {
        return Err(StoreError::Config("No contact points given".to_string()));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_connector_settings_defaults() {
        let settings = ConnectorSettings::default();
        assert_eq!(settings.app_name, "App");
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_retries_on_throttling, 1);
        assert_eq!(settings.max_retry_wait, Duration::from_secs(5));
    }

    #[test]
    fn test_connection_mode_parsing() {
        assert_eq!("Direct".parse::<ConnectionMode>().unwrap(), ConnectionMode::Direct);
        assert_eq!(" gateway ".parse::<ConnectionMode>().unwrap(), ConnectionMode::Gateway);
        assert!("tcp".parse::<ConnectionMode>().is_err());
        assert!(ConnectionMode::Direct.is_token_aware());
        assert!(!ConnectionMode::Gateway.is_token_aware());
    }

    #[test]
    fn test_config_from_env_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[("SCYLLA_CONNECTION", "127.0.0.1")])).unwrap();
        assert_eq!(config.mode, ConnectionMode::Direct);
        assert_eq!(config.database, "equinox");
        assert_eq!(config.collection, "events");
        assert_eq!(config.cache_mb, 50);
    }

    #[test]
    fn test_config_from_env_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("SCYLLA_MODE", "gateway"),
            ("SCYLLA_CONNECTION", "ContactPoints=db1"),
            ("SCYLLA_KEYSPACE", "todo"),
            ("SCYLLA_TABLE", "streams"),
            ("CACHE_MB", "10"),
        ]))
        .unwrap();

        assert_eq!(
            config,
            StoreConfig::new(ConnectionMode::Gateway, "ContactPoints=db1", "todo", "streams", 10)
        );
    }

    #[test]
    fn test_config_requires_connection_string() {
        let err = StoreConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_config_rejects_bad_cache_size() {
        let err = StoreConfig::from_lookup(lookup(&[
            ("SCYLLA_CONNECTION", "127.0.0.1"),
            ("CACHE_MB", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_discovery_from_full_connection_string() {
        let discovery = Discovery::from_connection_string(
            "Contact Points=db1:19042, db2;Username=app;Password=secret;",
        )
        .unwrap();

        assert_eq!(discovery.contact_points, vec!["db1:19042", "db2:9042"]);
        assert_eq!(
            discovery.credentials,
            Some(Credentials {
                username: "app".to_string(),
                password: "secret".to_string(),
            })
        );
    }

    #[test]
    fn test_discovery_from_bare_host_list() {
        let discovery = Discovery::from_connection_string("127.0.0.1:9042,10.0.0.2").unwrap();
        assert_eq!(discovery.contact_points, vec!["127.0.0.1:9042", "10.0.0.2:9042"]);
        assert!(discovery.credentials.is_none());
    }

    #[test]
    fn test_discovery_rejects_invalid_strings() {
        assert!(Discovery::from_connection_string("").is_err());
        assert!(Discovery::from_connection_string("Username=u;Password=p").is_err());
        assert!(Discovery::from_connection_string("ContactPoints=db1;Username=u").is_err());
        assert!(Discovery::from_connection_string("ContactPoints=db1;Region=eu").is_err());
        assert!(Discovery::from_connection_string("ContactPoints= , ").is_err());
    }
}
