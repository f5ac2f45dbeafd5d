use serde::Deserialize;
use std::env::vars;
use std::fmt::Display;
use tracing::info;

use crate::store::validate_name;

const DEFAULT_DATABASE_NAME: &str = "accounts";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub enum Env {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "prod")]
    Prod,
}

impl Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Env::Local => write!(f, "local"),
            Env::Test => write!(f, "test"),
            Env::Prod => write!(f, "prod"),
        }
    }
}

// The final, validated configuration struct.
// `database_name` is guaranteed to be a usable schema name.
#[derive(Debug, Clone)]
pub struct Config {
    env: Env,
    database_url: String,
    database_name: String,
    max_connections: u32,
}

// An intermediate struct for deserializing environment variables
// where the database name and pool size are optional.
#[derive(Deserialize)]
struct RawConfig {
    env: Env,
    database_url: String,
    database_name: Option<String>,
    database_max_connections: Option<u32>,
}

impl Config {
    /// Create a test configuration with default values.
    ///
    /// This function is available for both unit tests and integration tests.
    /// It should not be used in production code.
    pub fn new_for_test() -> Self {
        Self {
            env: Env::Local,
            database_url: "postgres://localhost:5432/test".to_owned(),
            database_name: DEFAULT_DATABASE_NAME.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    pub fn environment(&self) -> &Env {
        &self.env
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Name of the database (Postgres schema) holding the collections.
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn is_local(&self) -> bool {
        matches!(self.env, Env::Local | Env::Test)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self.env, Env::Prod)
    }

    /// Initializes configuration by reading from environment variables
    /// and applying environment-aware defaults.
    pub fn init() -> anyhow::Result<Self> {
        info!("Loading configuration from environment variables");

        let raw_config: RawConfig = serde_env::from_iter(vars())?;
        Self::from_raw(raw_config)
    }

    fn from_raw(raw_config: RawConfig) -> anyhow::Result<Self> {
        let RawConfig {
            env,
            database_url,
            database_name,
            database_max_connections,
        } = raw_config;

        let database_name = match database_name {
            Some(name) => name,
            None if matches!(env, Env::Local | Env::Test) => {
                info!(
                    "DATABASE_NAME not set, defaulting to {} for {} environment",
                    DEFAULT_DATABASE_NAME, env
                );
                DEFAULT_DATABASE_NAME.to_owned()
            }
            None => anyhow::bail!("DATABASE_NAME must be set for {} environment", env),
        };
        if validate_name(&database_name).is_err() {
            anyhow::bail!(
                "DATABASE_NAME must start with a letter or underscore and contain only \
                 letters, digits and underscores, got {:?}",
                database_name
            );
        }

        let max_connections = match database_max_connections {
            Some(0) => anyhow::bail!("DATABASE_MAX_CONNECTIONS must be at least 1"),
            Some(n) => n,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Config {
            env,
            database_url,
            database_name,
            max_connections,
        })
    }
}
