//! Daemon configuration: flags and `NSQLITED_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Hash format the configured auth token is stored in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AuthAlgorithm {
    Plaintext,
    Argon2,
    Bcrypt,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "nsqlited", version, about = "Network-accessible front end for a single-file SQLite database")]
pub struct Config {
    /// Directory for NSQLited database files
    #[arg(long = "data-directory", env = "NSQLITED_DATA_DIRECTORY", default_value = "./data")]
    pub data_directory: PathBuf,

    /// Address for the server to listen on
    #[arg(long = "listen-host", env = "NSQLITED_LISTEN_HOST", default_value = "0.0.0.0")]
    pub listen_host: String,

    /// Port for the server to listen on
    #[arg(long = "listen-port", env = "NSQLITED_LISTEN_PORT", default_value_t = 9876)]
    pub listen_port: u16,

    /// Pre-hashed auth token; leave empty to disable authentication
    #[arg(long = "auth-token", env = "NSQLITED_AUTH_TOKEN", default_value = "")]
    pub auth_token: String,

    /// Hash algorithm for the auth token
    #[arg(long = "auth-token-algorithm", env = "NSQLITED_AUTH_TOKEN_ALGORITHM", value_enum, default_value = "plaintext")]
    pub auth_token_algorithm: AuthAlgorithm,

    /// Roll back the active transaction after this much idle time
    #[arg(long = "transaction-idle-timeout", env = "NSQLITED_TRANSACTION_IDLE_TIMEOUT", value_parser = parse_timeout, default_value = "10s")]
    pub transaction_idle_timeout: Duration,
}

impl Config {
    pub fn bind_address(&self) -> String { format!("{}:{}", self.listen_host, self.listen_port) }
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let timeout = humantime::parse_duration(raw).map_err(|e| e.to_string())?;
    if timeout.is_zero() {
        return Err("transaction idle timeout must be greater than zero".to_string());
    }
    Ok(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["nsqlited"]);
        assert_eq!(config.data_directory, PathBuf::from("./data"));
        assert_eq!(config.listen_host, "0.0.0.0");
        assert_eq!(config.listen_port, 9876);
        assert!(config.auth_token.is_empty());
        assert_eq!(config.auth_token_algorithm, AuthAlgorithm::Plaintext);
        assert_eq!(config.transaction_idle_timeout, Duration::from_secs(10));
    }

    #[test]
    fn timeout_accepts_humantime_values() {
        let config = Config::parse_from(["nsqlited", "--transaction-idle-timeout", "5m"]);
        assert_eq!(config.transaction_idle_timeout, Duration::from_secs(300));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Config::try_parse_from(["nsqlited", "--transaction-idle-timeout", "0s"]).is_err());
    }

    #[test]
    fn algorithm_names() {
        let config = Config::parse_from(["nsqlited", "--auth-token-algorithm", "bcrypt"]);
        assert_eq!(config.auth_token_algorithm, AuthAlgorithm::Bcrypt);
        assert!(Config::try_parse_from(["nsqlited", "--auth-token-algorithm", "sha1"]).is_err());
    }
}
