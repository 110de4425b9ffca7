use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_LOT_SIZE: u64 = 10;
pub const DEFAULT_POSITION_LIMIT: i64 = 100;
pub const DEFAULT_TICK_SIZE: u64 = 100;
pub const DEFAULT_BUY_RATIO: f64 = 0.995;
pub const DEFAULT_SELL_RATIO: f64 = 1.005;
pub const DEFAULT_WINDOW_SIZE: usize = 20;
pub const DEFAULT_BAND_WIDTH: f64 = 1.0;
pub const DEFAULT_BOLLINGER_BONUS: u64 = 3;
pub const DEFAULT_EXTREMA_MULTIPLIER: u64 = 2;
pub const DEFAULT_DECAY_RATE: f64 = 0.01;
pub const DEFAULT_DECAY_UPPER_LIMIT: f64 = 1.002;
pub const DEFAULT_DECAY_LOWER_LIMIT: f64 = 0.998;
pub const DEFAULT_MAX_ASK_PRICE: u64 = i32::MAX as u64;
pub const DEFAULT_MIN_BID_PRICE: u64 = 1;
const DEFAULT_PAPER_SEED: u64 = 42;

#[derive(Debug)]
pub enum ConfigError {
    Invalid(String),
    UnknownSizingMode(String),
    UnknownGateway(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Invalid(e) => write!(f, "Invalid config: {}", e),
            ConfigError::UnknownSizingMode(e) => write!(f, "Unknown sizing mode: {}", e),
            ConfigError::UnknownGateway(e) => write!(f, "Unknown gateway: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingMode {
    Static,
    DecayingExtrema,
    Bollinger,
}

impl FromStr for SizingMode {
    type Err = ConfigError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(SizingMode::Static),
            "decaying_extrema" | "decay" | "extrema" => Ok(SizingMode::DecayingExtrema),
            "bollinger" => Ok(SizingMode::Bollinger),
            other => Err(ConfigError::UnknownSizingMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    /// Simulated matching against the replayed book.
    Paper,
    /// Commands written to stdout as JSON lines for an external adapter.
    Stdout,
    /// Commands only logged.
    Log,
}

impl FromStr for GatewayKind {
    type Err = ConfigError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paper" => Ok(GatewayKind::Paper),
            "stdout" => Ok(GatewayKind::Stdout),
            "log" | "dry" => Ok(GatewayKind::Log),
            other => Err(ConfigError::UnknownGateway(other.to_string())),
        }
    }
}

/// Strategy constants. Fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub lot_size: u64,
    pub position_limit: i64,
    pub tick_size: u64,
    pub buy_ratio: f64,
    pub sell_ratio: f64,
    pub sizing_mode: SizingMode,
    pub decay_rate: f64,
    pub decay_upper_limit: f64,
    pub decay_lower_limit: f64,
    pub extrema_multiplier: u64,
    pub window_size: usize,
    pub band_width: f64,
    pub bollinger_bonus: u64,
    pub max_ask_price: u64,
    pub min_bid_price: u64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            lot_size: DEFAULT_LOT_SIZE,
            position_limit: DEFAULT_POSITION_LIMIT,
            tick_size: DEFAULT_TICK_SIZE,
            buy_ratio: DEFAULT_BUY_RATIO,
            sell_ratio: DEFAULT_SELL_RATIO,
            sizing_mode: SizingMode::Static,
            decay_rate: DEFAULT_DECAY_RATE,
            decay_upper_limit: DEFAULT_DECAY_UPPER_LIMIT,
            decay_lower_limit: DEFAULT_DECAY_LOWER_LIMIT,
            extrema_multiplier: DEFAULT_EXTREMA_MULTIPLIER,
            window_size: DEFAULT_WINDOW_SIZE,
            band_width: DEFAULT_BAND_WIDTH,
            bollinger_bonus: DEFAULT_BOLLINGER_BONUS,
            max_ask_price: DEFAULT_MAX_ASK_PRICE,
            min_bid_price: DEFAULT_MIN_BID_PRICE,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.lot_size == 0 {
            return Err(ConfigError::Invalid("lot_size must be positive".to_owned()));
        }
        if self.position_limit <= 0 {
            return Err(ConfigError::Invalid(
                "position_limit must be positive".to_owned(),
            ));
        }
        if self.tick_size == 0 {
            return Err(ConfigError::Invalid("tick_size must be positive".to_owned()));
        }
        if !(self.buy_ratio < self.sell_ratio) {
            return Err(ConfigError::Invalid(format!(
                "buy_ratio {} must be below sell_ratio {}",
                self.buy_ratio, self.sell_ratio
            )));
        }
        if !(0.0..1.0).contains(&self.decay_rate) {
            return Err(ConfigError::Invalid(format!(
                "decay_rate {} must be in [0, 1)",
                self.decay_rate
            )));
        }
        if self.decay_lower_limit > 1.0 || self.decay_upper_limit < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "decay limits must straddle 1.0 (lower={}, upper={})",
                self.decay_lower_limit, self.decay_upper_limit
            )));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be positive".to_owned()));
        }
        if self.band_width < 0.0 {
            return Err(ConfigError::Invalid("band_width must not be negative".to_owned()));
        }
        if self.extrema_multiplier == 0 || self.bollinger_bonus == 0 {
            return Err(ConfigError::Invalid(
                "volume multipliers must be positive".to_owned(),
            ));
        }
        if self.min_bid_price == 0 || self.max_ask_price < self.tick_size {
            return Err(ConfigError::Invalid(format!(
                "hedge price bounds are unusable (min_bid={}, max_ask={})",
                self.min_bid_price, self.max_ask_price
            )));
        }
        Ok(())
    }

    /// Price used for aggressive hedge buys: the ceiling rounded down to a tick.
    pub fn hedge_buy_price(&self) -> u64 {
        self.max_ask_price / self.tick_size * self.tick_size
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
struct TraderYaml {
    lot_size: Option<u64>,
    position_limit: Option<i64>,
    tick_size: Option<u64>,
    buy_ratio: Option<f64>,
    sell_ratio: Option<f64>,
    sizing_mode: Option<String>,
    decay_rate: Option<f64>,
    decay_upper_limit: Option<f64>,
    decay_lower_limit: Option<f64>,
    extrema_multiplier: Option<u64>,
    window_size: Option<usize>,
    band_width: Option<f64>,
    bollinger_bonus: Option<u64>,
    max_ask_price: Option<u64>,
    min_bid_price: Option<u64>,
    gateway: Option<String>,
    replay_file: Option<String>,
    data_dump_file: Option<String>,
    paper_fill_probability: Option<f64>,
    paper_seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TraderConfig {
    pub params: StrategyParams,
    pub gateway: GatewayKind,
    /// JSON-lines event file. Events are read from stdin when unset.
    pub replay_file: Option<String>,
    pub data_dump_file: Option<String>,
    // Falls back to FILLED_PROBABILITY_IN_EMULATION in the paper gateway
    pub paper_fill_probability: Option<f64>,
    pub paper_seed: u64,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            params: StrategyParams::default(),
            gateway: GatewayKind::Paper,
            replay_file: None,
            data_dump_file: None,
            paper_fill_probability: None,
            paper_seed: DEFAULT_PAPER_SEED,
        }
    }
}

impl TraderConfig {
    pub fn from_env_or_yaml() -> Result<Self> {
        let config_path = env::var("RATIOTRADE_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty());
        if let Some(path) = config_path {
            return Self::from_yaml_path(path);
        }
        Self::from_env()
    }

    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("failed to open trader config {}", path_ref.display()))?;
        let yaml: TraderYaml = serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse trader config {}", path_ref.display()))?;

        let mut cfg = Self::from_yaml(yaml)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = TraderConfig::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_yaml(yaml: TraderYaml) -> Result<Self> {
        let defaults = StrategyParams::default();
        let sizing_mode = match yaml.sizing_mode.as_deref() {
            Some(raw) => raw.parse()?,
            None => defaults.sizing_mode,
        };
        let gateway = match yaml.gateway.as_deref() {
            Some(raw) => raw.parse()?,
            None => GatewayKind::Paper,
        };
        let params = StrategyParams {
            lot_size: yaml.lot_size.unwrap_or(defaults.lot_size),
            position_limit: yaml.position_limit.unwrap_or(defaults.position_limit),
            tick_size: yaml.tick_size.unwrap_or(defaults.tick_size),
            buy_ratio: yaml.buy_ratio.unwrap_or(defaults.buy_ratio),
            sell_ratio: yaml.sell_ratio.unwrap_or(defaults.sell_ratio),
            sizing_mode,
            decay_rate: yaml.decay_rate.unwrap_or(defaults.decay_rate),
            decay_upper_limit: yaml.decay_upper_limit.unwrap_or(defaults.decay_upper_limit),
            decay_lower_limit: yaml.decay_lower_limit.unwrap_or(defaults.decay_lower_limit),
            extrema_multiplier: yaml
                .extrema_multiplier
                .unwrap_or(defaults.extrema_multiplier),
            window_size: yaml.window_size.unwrap_or(defaults.window_size),
            band_width: yaml.band_width.unwrap_or(defaults.band_width),
            bollinger_bonus: yaml.bollinger_bonus.unwrap_or(defaults.bollinger_bonus),
            max_ask_price: yaml.max_ask_price.unwrap_or(defaults.max_ask_price),
            min_bid_price: yaml.min_bid_price.unwrap_or(defaults.min_bid_price),
        };
        Ok(TraderConfig {
            params,
            gateway,
            replay_file: yaml.replay_file.filter(|v| !v.trim().is_empty()),
            data_dump_file: yaml.data_dump_file.filter(|v| !v.trim().is_empty()),
            paper_fill_probability: yaml.paper_fill_probability,
            paper_seed: yaml.paper_seed.unwrap_or(DEFAULT_PAPER_SEED),
        })
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let p = &mut self.params;
        env_override("LOT_SIZE", &mut p.lot_size);
        env_override("POSITION_LIMIT", &mut p.position_limit);
        env_override("TICK_SIZE", &mut p.tick_size);
        env_override("BUY_RATIO", &mut p.buy_ratio);
        env_override("SELL_RATIO", &mut p.sell_ratio);
        env_override("DECAY_RATE", &mut p.decay_rate);
        env_override("DECAY_UPPER_LIMIT", &mut p.decay_upper_limit);
        env_override("DECAY_LOWER_LIMIT", &mut p.decay_lower_limit);
        env_override("EXTREMA_MULTIPLIER", &mut p.extrema_multiplier);
        env_override("WINDOW_SIZE", &mut p.window_size);
        env_override("BAND_WIDTH", &mut p.band_width);
        env_override("BOLLINGER_BONUS", &mut p.bollinger_bonus);
        env_override("MAX_ASK_PRICE", &mut p.max_ask_price);
        env_override("MIN_BID_PRICE", &mut p.min_bid_price);
        if let Some(value) = non_empty_env("SIZING_MODE") {
            p.sizing_mode = value.parse()?;
        }

        if let Some(value) = non_empty_env("GATEWAY") {
            self.gateway = value.parse()?;
        }
        if let Some(value) = non_empty_env("REPLAY_FILE") {
            self.replay_file = Some(value);
        }
        if let Some(value) = non_empty_env("DATA_DUMP_FILE") {
            self.data_dump_file = Some(value);
        }
        if let Some(value) = non_empty_env("PAPER_FILL_PROBABILITY") {
            match value.parse() {
                Ok(parsed) => self.paper_fill_probability = Some(parsed),
                Err(_) => log::warn!("[CONFIG] ignoring PAPER_FILL_PROBABILITY={}", value),
            }
        }
        env_override("PAPER_SEED", &mut self.paper_seed);
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.params.validate()?;
        if let Some(p) = self.paper_fill_probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!(
                    "paper_fill_probability {} must be in [0, 1]",
                    p
                )));
            }
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_override<T: FromStr>(key: &str, target: &mut T) {
    if let Some(value) = non_empty_env(key) {
        match value.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => log::warn!("[CONFIG] ignoring unparsable {}={}", key, value),
        }
    }
}
