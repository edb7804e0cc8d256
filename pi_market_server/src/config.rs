use std::env;

use chrono::Duration;
use log::*;
use pi_network_tools::PiNetworkConfig;
use pmg_common::{parse_boolean_flag, Secret};

const DEFAULT_PMG_HOST: &str = "127.0.0.1";
const DEFAULT_PMG_PORT: u16 = 8360;
const DEFAULT_PAYOUT_RETRY_DELAY: Duration = Duration::minutes(5);
const DEFAULT_PAYOUT_POLL_INTERVAL: Duration = Duration::seconds(15);
const DEFAULT_JWT_TTL: Duration = Duration::hours(24);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Shared secret for webhook HMAC signatures. Unset means development mode: signature checks
    /// are bypassed with a loud warning.
    pub webhook_secret: Secret<String>,
    pub pi_config: PiNetworkConfig,
    pub payout: PayoutConfig,
}

#[derive(Clone, Copy, Debug)]
pub struct PayoutConfig {
    /// How long to wait before re-attempting a payout whose store has no destination yet.
    pub retry_delay: Duration,
    /// How often the worker polls the task queue.
    pub poll_interval: Duration,
    /// How many times payment creation is attempted when the network reports an ongoing payment
    /// conflict (cancel-then-retry loop).
    pub max_create_attempts: u32,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_PAYOUT_RETRY_DELAY,
            poll_interval: DEFAULT_PAYOUT_POLL_INTERVAL,
            max_create_attempts: 3,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PMG_HOST.to_string(),
            port: DEFAULT_PMG_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            webhook_secret: Secret::default(),
            pi_config: PiNetworkConfig::default(),
            payout: PayoutConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PMG_HOST").ok().unwrap_or_else(|| DEFAULT_PMG_HOST.into());
        let port = env::var("PMG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PMG_PORT. {e} Using the default, {DEFAULT_PMG_PORT}, instead."
                    );
                    DEFAULT_PMG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PMG_PORT);
        let database_url = env::var("PMG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ PMG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let auth = AuthConfig::from_env_or_default();
        let webhook_secret = Secret::new(env::var("PMG_PI_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!(
                "🚨️ PMG_PI_WEBHOOK_SECRET is not set. Webhook signature checks are DISABLED. This is a \
                 development-mode bypass and must never be used in production."
            );
            String::default()
        }));
        let pi_config = PiNetworkConfig::new_from_env_or_default();
        let payout = PayoutConfig::from_env_or_default();
        Self { host, port, database_url, auth, webhook_secret, pi_config, payout }
    }
}

impl PayoutConfig {
    pub fn from_env_or_default() -> Self {
        let retry_delay = duration_from_env("PMG_PAYOUT_RETRY_DELAY_SECS", DEFAULT_PAYOUT_RETRY_DELAY);
        let poll_interval = duration_from_env("PMG_PAYOUT_POLL_INTERVAL_SECS", DEFAULT_PAYOUT_POLL_INTERVAL);
        let max_create_attempts = env::var("PMG_PAYOUT_MAX_CREATE_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3)
            .max(1);
        Self { retry_delay, poll_interval, max_create_attempts }
    }
}

fn duration_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| {
            info!("🪛️ {var} is not set. Using the default value of {} s.", default.num_seconds());
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::seconds)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  AuthConfig  ------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// HS256 secret used to sign and verify access tokens.
    pub jwt_secret: Secret<String>,
    pub token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { jwt_secret: Secret::default(), token_ttl: DEFAULT_JWT_TTL }
    }
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        let jwt_secret = match env::var("PMG_JWT_SECRET") {
            Ok(s) if !s.is_empty() => Secret::new(s),
            _ => {
                warn!(
                    "🚨️🚨️🚨️ PMG_JWT_SECRET has not been set. I'm using a random value for this session. DO NOT \
                     operate on production like this, since all issued tokens die with the process. 🚨️🚨️🚨️"
                );
                let random_key: String = (0..64).map(|_| format!("{:02x}", rand::random::<u8>())).collect();
                Secret::new(random_key)
            },
        };
        let token_ttl = duration_from_env("PMG_JWT_TTL_SECS", DEFAULT_JWT_TTL);
        Self { jwt_secret, token_ttl }
    }
}

/// True when `PMG_PI_SANDBOX` explicitly disables the sandbox without production credentials
/// being available. Used at startup to shout about misconfiguration.
pub fn running_mainnet_without_keys(config: &ServerConfig) -> bool {
    let sandbox = parse_boolean_flag(env::var("PMG_PI_SANDBOX").ok(), true);
    !sandbox && config.pi_config.is_mock()
}
