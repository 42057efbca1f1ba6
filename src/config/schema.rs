use serde::Deserialize;

use super::ConfigError;

/// Server registry for the replication check
///
/// Immutable once loaded: masters keyed by name, each with an ordered list of
/// named slaves. Slave order is the file order and is significant — it fixes
/// the iteration and output order of the check.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Byte-offset tolerance before a slave counts as behind
    #[serde(default = "default_max_bytes_diff")]
    pub max_bytes_diff: u64,
    #[serde(default)]
    pub masters: Vec<MasterConfig>,
}

fn default_max_bytes_diff() -> u64 {
    5000
}

fn default_port() -> u16 {
    3306
}

/// One replication master and its expected slaves
#[derive(Debug, Clone, Deserialize)]
pub struct MasterConfig {
    /// Registry key, passed on the command line
    pub name: String,
    /// Hostname or IP
    pub host: String,
    /// Port number
    #[serde(default = "default_port")]
    pub port: u16,
    /// MySQL username
    pub user: String,
    /// MySQL password
    pub password: String,
    /// Slaves expected to replicate from this master, in check order
    #[serde(default)]
    pub slaves: Vec<SlaveConfig>,
}

/// One slave of a configured master
#[derive(Debug, Clone, Deserialize)]
pub struct SlaveConfig {
    /// Display name used in the status line
    pub name: String,
    /// Hostname or IP; must match how the master's processlist reports it
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// Connection parameters for one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl ServerEndpoint {
    /// Get the address string (host:port)
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl MasterConfig {
    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

impl SlaveConfig {
    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

impl Config {
    /// Look up a master by its registry name
    pub fn master(&self, name: &str) -> Result<&MasterConfig, ConfigError> {
        self.masters
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| ConfigError::UnknownMaster(name.to_string()))
    }

    /// Fail fast on a registry the check could never run against
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.masters.is_empty() {
            return Err(ConfigError::Invalid(
                "no masters configured".to_string(),
            ));
        }

        for master in &self.masters {
            if master.name.trim().is_empty() {
                return Err(ConfigError::Invalid("master with empty name".to_string()));
            }
            if self.masters.iter().filter(|m| m.name == master.name).count() > 1 {
                return Err(ConfigError::Invalid(format!(
                    "duplicate master name '{}'",
                    master.name
                )));
            }
            for slave in &master.slaves {
                if slave.name.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "slave of master '{}' with empty name",
                        master.name
                    )));
                }
                if master
                    .slaves
                    .iter()
                    .filter(|s| s.name == slave.name)
                    .count()
                    > 1
                {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate slave name '{}' under master '{}'",
                        slave.name, master.name
                    )));
                }
            }
        }

        Ok(())
    }
}
