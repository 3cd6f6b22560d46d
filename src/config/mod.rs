use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub escrow: EscrowConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Identity-token verification. Tokens are HS256 JWTs whose `sub` is the
/// marketplace user id.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    /// Boolean claim that marks an admin caller.
    #[serde(default = "default_admin_claim")]
    pub admin_claim: String,
}

fn default_admin_claim() -> String {
    "admin".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub brand_name: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-m.sandbox.paypal.com".to_string(),
            client_id: None,
            client_secret: None,
            brand_name: "FlexHunt".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EscrowConfig {
    pub hold_days: i64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self { hold_days: 7 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Canonical origins; `www.` variants and trailing slashes are accepted.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "https://flexhunt.co".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://flexhunt.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("escrow.hold_days", 7)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Environment variables (FLEXHUNT__ prefix, double underscore separates levels).
            // Lists such as cors.allowed_origins are comma separated.
            .add_source(
                Environment::with_prefix("FLEXHUNT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://flexhunt.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                issuer: None,
                audience: None,
                admin_claim: default_admin_claim(),
            },
            gateway: GatewayConfig::default(),
            escrow: EscrowConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}
