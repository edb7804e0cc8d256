use log::*;
use pmg_common::{parse_boolean_flag, Secret};

const MAINNET_API_URL: &str = "https://api.minepi.com";
const SANDBOX_API_URL: &str = "https://api.sandbox.minepi.com";

#[derive(Debug, Clone, Default)]
pub struct PiNetworkConfig {
    /// Base URL for the platform API, without a trailing slash.
    pub base_url: String,
    /// Base URL for the ledger (transaction submission) API.
    pub ledger_url: String,
    /// The server API key. An empty key puts the client into a logged mock mode for development.
    pub api_key: Secret<String>,
    /// Seed for the app's custodial wallet, hex-encoded. Only needed for payouts.
    pub wallet_seed: Secret<String>,
    pub sandbox: bool,
}

impl PiNetworkConfig {
    pub fn new_from_env_or_default() -> Self {
        let sandbox = parse_boolean_flag(std::env::var("PMG_PI_SANDBOX").ok(), true);
        let default_url = if sandbox { SANDBOX_API_URL } else { MAINNET_API_URL };
        let base_url = std::env::var("PMG_PI_BASE_URL").unwrap_or_else(|_| default_url.to_string());
        let ledger_url = std::env::var("PMG_PI_LEDGER_URL").unwrap_or_else(|_| format!("{base_url}/ledger"));
        let api_key = Secret::new(std::env::var("PMG_PI_API_KEY").unwrap_or_else(|_| {
            warn!("🌐️ PMG_PI_API_KEY is not set. Pi network calls will run in mock mode.");
            String::default()
        }));
        let wallet_seed = Secret::new(std::env::var("PMG_PI_WALLET_SEED").unwrap_or_else(|_| {
            warn!("🌐️ PMG_PI_WALLET_SEED is not set. Payout transfers cannot be signed.");
            String::default()
        }));
        if sandbox {
            info!("🌐️ Pi network client is using the sandbox at {base_url}");
        }
        Self { base_url, ledger_url, api_key, wallet_seed, sandbox }
    }

    /// True when no API key has been configured and payment network calls should be mocked.
    pub fn is_mock(&self) -> bool {
        self.api_key.is_unset()
    }
}
