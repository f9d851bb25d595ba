// src/config.rs
//! Immutable startup configuration: environment scalars plus the destinations
//! file, read once before the loop starts and passed explicitly from there.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

pub const ENV_DESTINATIONS_PATH: &str = "DESTINATIONS_PATH";

#[derive(Debug, Clone)]
pub struct Config {
    pub channel: ChannelConfig,
    pub poll: PollConfig,
    pub trade: TradeConfig,
    pub state_file: PathBuf,
    pub fetch_limit: usize,
    pub cooldown_secs: i64,
    pub dry_run: bool,
    pub destinations: Vec<DestinationConfig>,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub token: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub base_secs: u64,
    pub offset_secs: u64,
    pub jitter_max_secs: u64,
}

/// Signal-to-order tuning shared by every destination.
#[derive(Debug, Clone)]
pub struct TradeConfig {
    pub quote: String,
    pub entry_trigger_buffer_pct: f64,
    pub stop_loss_pct: f64,
    pub expiration_min: u64,
    pub expiration_price_pct: f64,
}

/// One downstream sink, as declared in the destinations file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DestinationConfig {
    /// Relay destination: trigger-only custom-signal webhook.
    TriggerWebhook {
        name: String,
        url: String,
        secret: String,
        bot_uuid: String,
        #[serde(default = "default_max_lag")]
        max_lag: u64,
        #[serde(default = "default_exchange")]
        exchange: String,
        #[serde(default = "default_suffix")]
        instrument_suffix: String,
    },
    /// Direct-execution destination: conditional order with bracket TP/SL.
    OrderGateway {
        name: String,
        url: String,
        api_key: String,
        #[serde(default = "default_category")]
        category: String,
        leverage: f64,
        risk_per_trade: f64,
    },
}

fn default_max_lag() -> u64 {
    300
}
fn default_exchange() -> String {
    "BINANCE".to_string()
}
fn default_suffix() -> String {
    ".P".to_string()
}
fn default_category() -> String {
    "linear".to_string()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let channel = ChannelConfig {
            token: require_env("DISCORD_TOKEN")?,
            channel_id: require_env("CHANNEL_ID")?,
        };

        let poll = PollConfig {
            base_secs: env_or("POLL_BASE_SECONDS", 15)?,
            offset_secs: env_or("POLL_OFFSET_SECONDS", 0)?,
            jitter_max_secs: env_or("POLL_JITTER_MAX", 3)?,
        };

        let trade = TradeConfig {
            quote: env_or_string("QUOTE", "USDT").to_uppercase(),
            entry_trigger_buffer_pct: env_or("ENTRY_TRIGGER_BUFFER_PCT", 0.0)?,
            stop_loss_pct: env_or("STOP_LOSS_PCT", 19.0)?,
            expiration_min: env_or("ENTRY_EXPIRATION_MIN", 180)?,
            expiration_price_pct: env_or("ENTRY_EXPIRATION_PRICE_PCT", 0.0)?,
        };

        let dry_run = env_bool("DRY_RUN", false);
        let destinations = load_destinations_default()?;
        if destinations.is_empty() && !dry_run {
            bail!(
                "no destinations configured; provide {} or config/destinations.toml",
                ENV_DESTINATIONS_PATH
            );
        }

        Ok(Self {
            channel,
            poll,
            trade,
            state_file: PathBuf::from(env_or_string("STATE_FILE", "state.json")),
            fetch_limit: env_or("DISCORD_FETCH_LIMIT", 50)?,
            cooldown_secs: env_or("COOLDOWN_SECONDS", 0)?,
            dry_run,
            destinations,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("missing required environment variable {key}"))
}

fn env_or_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {key}: {e}")),
        _ => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Load destinations from an explicit path. Supports TOML or JSON formats.
pub fn load_destinations_from(path: &Path) -> Result<Vec<DestinationConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading destinations from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_destinations(&content, ext.as_str())
}

/// Load destinations using env var + fallbacks:
/// 1) $DESTINATIONS_PATH
/// 2) config/destinations.toml
/// 3) config/destinations.json
pub fn load_destinations_default() -> Result<Vec<DestinationConfig>> {
    if let Ok(p) = std::env::var(ENV_DESTINATIONS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_destinations_from(&pb);
        }
        return Err(anyhow!("DESTINATIONS_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/destinations.toml");
    if toml_p.exists() {
        return load_destinations_from(&toml_p);
    }
    let json_p = PathBuf::from("config/destinations.json");
    if json_p.exists() {
        return load_destinations_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_destinations(s: &str, hint_ext: &str) -> Result<Vec<DestinationConfig>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[destinations]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    // Try JSON array
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    // Fallback: also try TOML if not attempted
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported destinations format"))
}

fn parse_toml(s: &str) -> Result<Vec<DestinationConfig>> {
    #[derive(Deserialize)]
    struct TomlFile {
        destinations: Vec<DestinationConfig>,
    }
    let v: TomlFile = toml::from_str(s)?;
    Ok(v.destinations)
}

fn parse_json(s: &str) -> Result<Vec<DestinationConfig>> {
    let v: Vec<DestinationConfig> = serde_json::from_str(s)?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    const TOML_SRC: &str = r#"
[[destinations]]
kind = "trigger-webhook"
name = "commas"
url = "https://hooks.example.test/signal"
secret = "s3cret"
bot_uuid = "uuid-1"

[[destinations]]
kind = "order-gateway"
name = "gateway"
url = "https://gw.example.test/order"
api_key = "key"
leverage = 5.0
risk_per_trade = 10.0
"#;

    #[test]
    fn toml_and_defaults_parse() {
        let out = parse_destinations(TOML_SRC, "toml").unwrap();
        assert_eq!(out.len(), 2);
        match &out[0] {
            DestinationConfig::TriggerWebhook {
                name,
                max_lag,
                exchange,
                instrument_suffix,
                ..
            } => {
                assert_eq!(name, "commas");
                assert_eq!(*max_lag, 300);
                assert_eq!(exchange, "BINANCE");
                assert_eq!(instrument_suffix, ".P");
            }
            other => panic!("unexpected destination: {other:?}"),
        }
        match &out[1] {
            DestinationConfig::OrderGateway {
                category, leverage, ..
            } => {
                assert_eq!(category, "linear");
                assert_eq!(*leverage, 5.0);
            }
            other => panic!("unexpected destination: {other:?}"),
        }
    }

    #[test]
    fn json_array_parses() {
        let json = r#"[
            {"kind": "trigger-webhook", "name": "c", "url": "u", "secret": "s", "bot_uuid": "b", "max_lag": 120}
        ]"#;
        let out = parse_destinations(json, "json").unwrap();
        match &out[0] {
            DestinationConfig::TriggerWebhook { max_lag, .. } => assert_eq!(*max_lag, 120),
            other => panic!("unexpected destination: {other:?}"),
        }
    }

    #[serial_test::serial]
    #[test]
    fn env_path_overrides_fallbacks() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("dest.toml");
        fs::write(&p, TOML_SRC).unwrap();

        env::set_var(ENV_DESTINATIONS_PATH, p.display().to_string());
        let out = load_destinations_default().unwrap();
        assert_eq!(out.len(), 2);
        env::remove_var(ENV_DESTINATIONS_PATH);
    }

    #[serial_test::serial]
    #[test]
    fn missing_env_path_is_an_error() {
        env::set_var(ENV_DESTINATIONS_PATH, "/definitely/not/here.toml");
        assert!(load_destinations_default().is_err());
        env::remove_var(ENV_DESTINATIONS_PATH);
    }
}
