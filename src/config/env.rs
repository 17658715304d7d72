use config::{Config as ConfigLoader, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use super::contracts::{ContractAddresses, ContractType};
use crate::error::Error;

/// Environment variable prefixes for different configuration sections
const ENV_NETWORK_PREFIX: &str = "DEXTER_NETWORK";
const ENV_CONTRACT_PREFIX: &str = "DEXTER_CONTRACT";
const ENV_LOG_PREFIX: &str = "DEXTER_LOG";

pub(crate) const DEFAULT_NETWORK_NAME: &str = "xion-testnet";
pub(crate) const DEFAULT_CHAIN_ID: &str = "xion-testnet-1";
pub(crate) const DEFAULT_RPC_URL: &str = "https://rpc.xion-testnet-1.burnt.com:443";
pub(crate) const DEFAULT_GAS_PRICE: f64 = 0.001;
pub(crate) const DEFAULT_GAS_ADJUSTMENT: f64 = 1.4;
pub(crate) const DEFAULT_NATIVE_DENOM: &str = "uxion";
pub(crate) const DEFAULT_ACCOUNT_PREFIX: &str = "xion";
pub(crate) const DEFAULT_GAS_LIMIT: u64 = 2_000_000;

/// Network configuration loaded from environment/files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkEnvConfig {
    /// Network name (e.g., "xion-testnet")
    pub name: Option<String>,
    /// Chain ID for transactions
    pub chain_id: Option<String>,
    /// RPC endpoint URL
    pub rpc_url: Option<String>,
    /// Gas price in native token
    pub gas_price: Option<f64>,
    /// Gas adjustment multiplier
    pub gas_adjustment: Option<f64>,
    /// Native token denomination
    pub native_denom: Option<String>,
    /// Bech32 account prefix
    pub account_prefix: Option<String>,
    /// Gas limit per execution
    pub gas_limit: Option<u64>,
    /// Broadcast mode ("sync" or "commit")
    pub broadcast_mode: Option<String>,
    /// Request timeout for RPC calls (seconds)
    pub rpc_timeout_secs: Option<u64>,
    /// Delay between confirmation lookups (milliseconds)
    pub confirmation_poll_interval_ms: Option<u64>,
    /// Upper bound for the confirmation backoff (milliseconds)
    pub confirmation_max_poll_interval_ms: Option<u64>,
    /// Size gas by simulating each transaction first
    pub simulate_gas: Option<bool>,
}

/// Logging configuration from environment/files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingEnvConfig {
    /// Log level or filter directive (error, warn, info, debug, trace)
    pub level: Option<String>,
    /// Log format (compact, pretty, json)
    pub format: Option<String>,
    /// Enable colored output
    pub enable_colors: Option<bool>,
}

/// Complete environment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Network configuration
    pub network: NetworkEnvConfig,
    /// Contract addresses
    #[serde(default)]
    pub contracts: ContractAddresses,
    /// Logging configuration
    pub logging: LoggingEnvConfig,
    /// Configuration file paths that were loaded
    #[serde(skip)]
    pub loaded_files: Vec<String>,
}

impl EnvironmentConfig {
    /// Load configuration from files, then environment variables
    pub fn load() -> Result<Self, Error> {
        let mut env_config = Self::default();

        env_config.load_from_files()?;
        env_config.load_from_env()?;
        env_config.validate()?;

        Ok(env_config)
    }

    /// Load configuration from a single file, then environment variables
    pub fn load_from_path(path: &Path) -> Result<Self, Error> {
        let mut env_config = Self::default();

        env_config.load_config_file(path)?;
        env_config
            .loaded_files
            .push(path.to_string_lossy().to_string());
        env_config.load_from_env()?;
        env_config.validate()?;

        Ok(env_config)
    }

    fn load_from_files(&mut self) -> Result<(), Error> {
        let config_dir = env::var("DEXTER_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let config_files = ["dexter.toml", "dexter.json", "config.toml", "config.json"];

        let search_paths = [config_dir, "config".to_string(), ".".to_string()];

        for search_path in &search_paths {
            for config_file in &config_files {
                let file_path = Path::new(search_path).join(config_file);
                let display = file_path.to_string_lossy().to_string();
                if file_path.exists() && !self.loaded_files.contains(&display) {
                    self.load_config_file(&file_path)?;
                    self.loaded_files.push(display);
                }
            }
        }

        Ok(())
    }

    fn load_config_file(&mut self, file_path: &Path) -> Result<(), Error> {
        let file_format = match file_path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        };

        let settings = ConfigLoader::builder()
            .add_source(File::from(file_path).format(file_format))
            .build()
            .map_err(|e| Error::Config(format!("Failed to load config file: {}", e)))?;

        if let Ok(network_config) = settings.get::<NetworkEnvConfig>("network") {
            self.merge_network_config(network_config);
        }

        if let Ok(contracts) = settings.get::<ContractAddresses>("contracts") {
            self.contracts.merge_missing(contracts);
        }

        if let Ok(logging_config) = settings.get::<LoggingEnvConfig>("logging") {
            self.merge_logging_config(logging_config);
        }

        Ok(())
    }

    fn load_from_env(&mut self) -> Result<(), Error> {
        self.load_network_env();
        self.load_contract_env();
        self.load_logging_env();
        Ok(())
    }

    fn load_network_env(&mut self) {
        if let Ok(name) = env::var(format!("{}_NAME", ENV_NETWORK_PREFIX)) {
            self.network.name = Some(name);
        }

        if let Ok(chain_id) = env::var(format!("{}_CHAIN_ID", ENV_NETWORK_PREFIX)) {
            self.network.chain_id = Some(chain_id);
        }

        if let Ok(rpc_url) = env::var(format!("{}_RPC_URL", ENV_NETWORK_PREFIX)) {
            self.network.rpc_url = Some(rpc_url);
        }

        if let Some(gas_price) = parse_env::<f64>(ENV_NETWORK_PREFIX, "GAS_PRICE") {
            self.network.gas_price = Some(gas_price);
        }

        if let Some(gas_adjustment) = parse_env::<f64>(ENV_NETWORK_PREFIX, "GAS_ADJUSTMENT") {
            self.network.gas_adjustment = Some(gas_adjustment);
        }

        if let Ok(native_denom) = env::var(format!("{}_NATIVE_DENOM", ENV_NETWORK_PREFIX)) {
            self.network.native_denom = Some(native_denom);
        }

        if let Ok(prefix) = env::var(format!("{}_ACCOUNT_PREFIX", ENV_NETWORK_PREFIX)) {
            self.network.account_prefix = Some(prefix);
        }

        if let Some(gas_limit) = parse_env::<u64>(ENV_NETWORK_PREFIX, "GAS_LIMIT") {
            self.network.gas_limit = Some(gas_limit);
        }

        if let Ok(mode) = env::var(format!("{}_BROADCAST_MODE", ENV_NETWORK_PREFIX)) {
            self.network.broadcast_mode = Some(mode);
        }

        if let Some(timeout) = parse_env::<u64>(ENV_NETWORK_PREFIX, "RPC_TIMEOUT_SECS") {
            self.network.rpc_timeout_secs = Some(timeout);
        }

        if let Some(interval) = parse_env::<u64>(ENV_NETWORK_PREFIX, "CONFIRMATION_POLL_INTERVAL_MS")
        {
            self.network.confirmation_poll_interval_ms = Some(interval);
        }

        if let Some(interval) =
            parse_env::<u64>(ENV_NETWORK_PREFIX, "CONFIRMATION_MAX_POLL_INTERVAL_MS")
        {
            self.network.confirmation_max_poll_interval_ms = Some(interval);
        }

        if let Some(simulate) = parse_env::<bool>(ENV_NETWORK_PREFIX, "SIMULATE_GAS") {
            self.network.simulate_gas = Some(simulate);
        }
    }

    fn load_contract_env(&mut self) {
        for contract_type in ContractType::ALL {
            let key = format!(
                "{}_{}",
                ENV_CONTRACT_PREFIX,
                contract_type.to_string().to_uppercase()
            );
            if let Ok(address) = env::var(&key) {
                self.contracts.set(contract_type, address);
            }
        }
    }

    fn load_logging_env(&mut self) {
        if let Ok(level) = env::var(format!("{}_LEVEL", ENV_LOG_PREFIX)) {
            self.logging.level = Some(level);
        }

        if let Ok(format) = env::var(format!("{}_FORMAT", ENV_LOG_PREFIX)) {
            self.logging.format = Some(format);
        }

        if let Some(colors) = parse_env::<bool>(ENV_LOG_PREFIX, "ENABLE_COLORS") {
            self.logging.enable_colors = Some(colors);
        }
    }

    /// Merge network configuration (values already set win)
    fn merge_network_config(&mut self, file_config: NetworkEnvConfig) {
        let n = &mut self.network;
        n.name = n.name.take().or(file_config.name);
        n.chain_id = n.chain_id.take().or(file_config.chain_id);
        n.rpc_url = n.rpc_url.take().or(file_config.rpc_url);
        n.gas_price = n.gas_price.or(file_config.gas_price);
        n.gas_adjustment = n.gas_adjustment.or(file_config.gas_adjustment);
        n.native_denom = n.native_denom.take().or(file_config.native_denom);
        n.account_prefix = n.account_prefix.take().or(file_config.account_prefix);
        n.gas_limit = n.gas_limit.or(file_config.gas_limit);
        n.broadcast_mode = n.broadcast_mode.take().or(file_config.broadcast_mode);
        n.rpc_timeout_secs = n.rpc_timeout_secs.or(file_config.rpc_timeout_secs);
        n.confirmation_poll_interval_ms = n
            .confirmation_poll_interval_ms
            .or(file_config.confirmation_poll_interval_ms);
        n.confirmation_max_poll_interval_ms = n
            .confirmation_max_poll_interval_ms
            .or(file_config.confirmation_max_poll_interval_ms);
        n.simulate_gas = n.simulate_gas.or(file_config.simulate_gas);
    }

    fn merge_logging_config(&mut self, file_config: LoggingEnvConfig) {
        let l = &mut self.logging;
        l.level = l.level.take().or(file_config.level);
        l.format = l.format.take().or(file_config.format);
        l.enable_colors = l.enable_colors.or(file_config.enable_colors);
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(gas_price) = self.network.gas_price {
            if gas_price <= 0.0 {
                return Err(Error::Config("Gas price must be positive".to_string()));
            }
        }

        if let Some(gas_adjustment) = self.network.gas_adjustment {
            if gas_adjustment <= 0.0 {
                return Err(Error::Config("Gas adjustment must be positive".to_string()));
            }
        }

        if let Some(gas_limit) = self.network.gas_limit {
            if gas_limit == 0 {
                return Err(Error::Config("Gas limit must be greater than 0".to_string()));
            }
        }

        if let (Some(initial), Some(max)) = (
            self.network.confirmation_poll_interval_ms,
            self.network.confirmation_max_poll_interval_ms,
        ) {
            if max < initial {
                return Err(Error::Config(
                    "Maximum confirmation poll interval must not be below the initial interval"
                        .to_string(),
                ));
            }
        }

        if let Some(ref rpc_url) = self.network.rpc_url {
            let parsed = url::Url::parse(rpc_url)
                .map_err(|e| Error::Config(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(
                    "RPC URL must start with http:// or https://".to_string(),
                ));
            }
        }

        if let Some(ref mode) = self.network.broadcast_mode {
            mode.parse::<super::BroadcastMode>()?;
        }

        if let Some(ref chain_id) = self.network.chain_id {
            if chain_id.trim().is_empty() {
                return Err(Error::Config("Chain ID cannot be empty".to_string()));
            }
        }

        if let Some(ref level) = self.logging.level {
            let valid_levels = ["error", "warn", "info", "debug", "trace"];
            let base = level.split(',').next().unwrap_or_default();
            if !base.contains('=') && !valid_levels.contains(&base) {
                return Err(Error::Config(format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    level, valid_levels
                )));
            }
        }

        if let Some(ref format) = self.logging.format {
            let valid_formats = ["compact", "pretty", "json"];
            if !valid_formats.contains(&format.as_str()) {
                return Err(Error::Config(format!(
                    "Invalid log format '{}'. Must be one of: {:?}",
                    format, valid_formats
                )));
            }
        }

        let prefix = self
            .network
            .account_prefix
            .as_deref()
            .unwrap_or(DEFAULT_ACCOUNT_PREFIX);
        self.contracts.validate(prefix)?;

        Ok(())
    }

    /// Generate default configuration file
    pub fn generate_default_config() -> Self {
        let mut config = Self::default();

        config.network.name = Some(DEFAULT_NETWORK_NAME.to_string());
        config.network.chain_id = Some(DEFAULT_CHAIN_ID.to_string());
        config.network.rpc_url = Some(DEFAULT_RPC_URL.to_string());
        config.network.gas_price = Some(DEFAULT_GAS_PRICE);
        config.network.gas_adjustment = Some(DEFAULT_GAS_ADJUSTMENT);
        config.network.native_denom = Some(DEFAULT_NATIVE_DENOM.to_string());
        config.network.account_prefix = Some(DEFAULT_ACCOUNT_PREFIX.to_string());
        config.network.gas_limit = Some(DEFAULT_GAS_LIMIT);
        config.network.broadcast_mode = Some("sync".to_string());
        config.network.rpc_timeout_secs = Some(30);
        config.network.confirmation_poll_interval_ms = Some(1_000);
        config.network.confirmation_max_poll_interval_ms = Some(30_000);
        config.network.simulate_gas = Some(true);

        config.logging.level = Some("info".to_string());
        config.logging.format = Some("compact".to_string());
        config.logging.enable_colors = Some(true);

        config
    }

    /// Save configuration to file
    pub fn save_to_file(&self, file_path: &Path) -> Result<(), Error> {
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(file_path, content)?;
        Ok(())
    }

    pub fn get_network_name(&self) -> String {
        self.network
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string())
    }

    pub fn get_chain_id(&self) -> String {
        self.network
            .chain_id
            .clone()
            .unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string())
    }

    pub fn get_rpc_url(&self) -> String {
        self.network
            .rpc_url
            .clone()
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string())
    }

    pub fn get_gas_price(&self) -> f64 {
        self.network.gas_price.unwrap_or(DEFAULT_GAS_PRICE)
    }

    pub fn get_gas_adjustment(&self) -> f64 {
        self.network.gas_adjustment.unwrap_or(DEFAULT_GAS_ADJUSTMENT)
    }

    pub fn get_native_denom(&self) -> String {
        self.network
            .native_denom
            .clone()
            .unwrap_or_else(|| DEFAULT_NATIVE_DENOM.to_string())
    }

    pub fn get_account_prefix(&self) -> String {
        self.network
            .account_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_ACCOUNT_PREFIX.to_string())
    }
}

fn parse_env<T: std::str::FromStr>(prefix: &str, key: &str) -> Option<T> {
    env::var(format!("{}_{}", prefix, key))
        .ok()
        .and_then(|v| v.parse::<T>().ok())
}
