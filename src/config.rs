use crate::backend::WalletSettings;
use crate::domain::{BonusInfo, Decimal, UserId};
use crate::ledger::{DEFAULT_FANCOINS_PER_DOLLAR, DEFAULT_STARTING_CREDITS};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: BackendMode,
    pub api_timeout: Duration,
    pub api_retry_window: Duration,
    pub wallet: WalletSettings,
    /// Wallets created at startup in simulated mode.
    pub bootstrap_users: Vec<UserId>,
}

/// Which wallet backend serves requests. Fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMode {
    /// Local ledger persisted to the SQLite file at `database_path`.
    Simulated { database_path: String },
    Live { api_url: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let live = match env_map
            .get("WALLET_LIVE_MODE")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("false")
        {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" | "" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "WALLET_LIVE_MODE".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let backend = if live {
            let api_url = env_map
                .get("WALLET_API_URL")
                .cloned()
                .ok_or_else(|| ConfigError::MissingEnv("WALLET_API_URL".to_string()))?;
            BackendMode::Live { api_url }
        } else {
            let database_path = env_map
                .get("DATABASE_PATH")
                .cloned()
                .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;
            BackendMode::Simulated { database_path }
        };

        let api_timeout = parse_millis(&env_map, "WALLET_API_TIMEOUT_MS", 10_000)?;
        let api_retry_window = parse_millis(&env_map, "WALLET_API_RETRY_WINDOW_MS", 0)?;

        let starting_credits =
            parse_amount(&env_map, "STARTING_TRADING_CREDITS", DEFAULT_STARTING_CREDITS)?;
        if starting_credits.is_negative() {
            return Err(ConfigError::InvalidValue(
                "STARTING_TRADING_CREDITS".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let fan_coins_per_dollar = parse_amount(
            &env_map,
            "FANCOINS_PER_DOLLAR",
            &DEFAULT_FANCOINS_PER_DOLLAR.to_string(),
        )?;
        if !fan_coins_per_dollar.is_positive() {
            return Err(ConfigError::InvalidValue(
                "FANCOINS_PER_DOLLAR".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        let bonus_info = load_bonus_info(&env_map)?;
        let bootstrap_users = parse_bootstrap_users(&env_map)?;

        Ok(Config {
            port,
            backend,
            api_timeout,
            api_retry_window,
            wallet: WalletSettings {
                starting_credits,
                fan_coins_per_dollar,
                bonus_info,
            },
            bootstrap_users,
        })
    }
}

fn parse_millis(
    env_map: &HashMap<String, String>,
    key: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match env_map.get(key) {
        None => Ok(Duration::from_millis(default_ms)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string())
            }),
    }
}

fn parse_amount(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Decimal::from_str(raw.trim()).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a decimal number".to_string())
    })
}

fn load_bonus_info(env_map: &HashMap<String, String>) -> Result<BonusInfo, ConfigError> {
    let Some(path) = env_map.get("BONUS_INFO_FILE") else {
        return Ok(BonusInfo::default());
    };
    let invalid = |msg: String| ConfigError::InvalidValue("BONUS_INFO_FILE".to_string(), msg);

    let content = std::fs::read_to_string(path)
        .map_err(|_| invalid("file not found or unreadable".to_string()))?;
    let bonus_info: BonusInfo =
        serde_json::from_str(&content).map_err(|e| invalid(format!("invalid JSON: {}", e)))?;
    bonus_info.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(bonus_info)
}

fn parse_bootstrap_users(env_map: &HashMap<String, String>) -> Result<Vec<UserId>, ConfigError> {
    let (key, raw): (&str, String) = if let Some(users) = env_map.get("WALLET_USERS") {
        ("WALLET_USERS", users.replace(',', "\n"))
    } else if let Some(file_path) = env_map.get("WALLET_USERS_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "WALLET_USERS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        ("WALLET_USERS_FILE", content)
    } else {
        return Ok(Vec::new());
    };

    raw.lines()
        .map(|line| line.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            UserId::from_str(s).map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), format!("invalid user id: {}", s))
            })
        })
        .collect()
}
