use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const LISTEN_ADDR_ENV: &str = "WAYPOINT_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "WAYPOINT_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "WAYPOINT_MYSQL_DSN";
pub const CACHE_TTL_ENV: &str = "WAYPOINT_CACHE_TTL_SECS";
pub const SITE_DIR_ENV: &str = "WAYPOINT_SITE_DIR";
pub const NOT_FOUND_LOGGING_ENV: &str = "WAYPOINT_404_LOGGING";
pub const RETENTION_DAYS_ENV: &str = "WAYPOINT_RETENTION_DAYS";
pub const EXCLUDE_PATTERNS_FILE_ENV: &str = "WAYPOINT_EXCLUDE_PATTERNS_FILE";
pub const AUTO_DELETE_ENV: &str = "WAYPOINT_AUTO_DELETE_ON_CONVERSION";
pub const IP_HASH_SALT_ENV: &str = "WAYPOINT_IP_HASH_SALT";
pub const LOG_FORMAT_ENV: &str = "WAYPOINT_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "WAYPOINT_OTLP_ENDPOINT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_CACHE_TTL_SECS: &str = "3600";
pub const DEFAULT_RETENTION_DAYS: &str = "30";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "plain")]
    Plain,
    #[value(name = "json")]
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "waypoint-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// Seconds a rule snapshot is served before it is rebuilt.
    #[arg(long, env = CACHE_TTL_ENV, default_value = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl_secs: u64,

    /// Directory served for requests that match no redirect.
    #[arg(long, env = SITE_DIR_ENV)]
    pub site_dir: Option<PathBuf>,

    #[arg(
        long = "not-found-logging",
        env = NOT_FOUND_LOGGING_ENV,
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub not_found_logging: bool,

    #[arg(long, env = RETENTION_DAYS_ENV, default_value = DEFAULT_RETENTION_DAYS)]
    pub retention_days: u32,

    /// File with one exclusion pattern per line.
    #[arg(long, env = EXCLUDE_PATTERNS_FILE_ENV)]
    pub exclude_patterns_file: Option<PathBuf>,

    #[arg(long, env = AUTO_DELETE_ENV)]
    pub auto_delete_on_conversion: bool,

    /// Salt for client address hashes. A random one is generated per process
    /// when unset.
    #[arg(long, env = IP_HASH_SALT_ENV, hide_env_values = true)]
    pub ip_hash_salt: Option<String>,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Plain)]
    pub log_format: LogFormatArg,

    #[arg(long, env = OTLP_ENDPOINT_ENV)]
    pub otlp_endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = CLI::try_parse_from(["gateway"]).unwrap();
        assert_eq!(cli.storage, StorageBackendArg::InMemory);
        assert_eq!(cli.listen_addr.port(), 8080);
        assert_eq!(cli.cache_ttl_secs, 3600);
        assert_eq!(cli.retention_days, 30);
        assert!(cli.not_found_logging);
        assert!(!cli.auto_delete_on_conversion);
        assert!(cli.ip_hash_salt.is_none());
    }

    #[test]
    fn mysql_requires_dsn() {
        assert!(CLI::try_parse_from(["gateway", "--storage", "mysql"]).is_err());
        let cli = CLI::try_parse_from([
            "gateway",
            "--storage",
            "mysql",
            "--mysql-dsn",
            "mysql://waypoint@localhost/waypoint",
        ])
        .unwrap();
        assert!(cli.mysql_dsn.is_some());
    }

    #[test]
    fn logging_can_be_switched_off() {
        let cli = CLI::try_parse_from(["gateway", "--not-found-logging", "false"]).unwrap();
        assert!(!cli.not_found_logging);
    }
}
