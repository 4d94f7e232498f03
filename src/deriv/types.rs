use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::model::tick::Tick;

/// Dispatch key for tick stream frames.
pub const MSG_TICK: &str = "tick";
pub const MSG_ACTIVE_SYMBOLS: &str = "active_symbols";
/// Pseudo message type carrying client log entries.
pub const MSG_CONNECTION_LOG: &str = "connection_log";
/// Subscribers on this key receive every inbound frame.
pub const MSG_WILDCARD: &str = "*";

/// Request key used to subscribe to a tick feed.
pub const TICKS_FEED_KEY: &str = "ticks";

/// Deserialize a number that the API may send either as a JSON number or as a
/// numeric string.
pub fn string_or_number_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => s.parse::<f64>().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("invalid number")),
        _ => Err(serde::de::Error::custom("invalid numeric value")),
    }
}

/// `{"ticks": "R_100", "subscribe": 1}`
#[derive(Debug, Clone, Serialize)]
pub struct TicksRequest<'a> {
    pub ticks: &'a str,
    pub subscribe: u8,
}

impl<'a> TicksRequest<'a> {
    pub fn subscribe(symbol: &'a str) -> Self {
        Self {
            ticks: symbol,
            subscribe: 1,
        }
    }
}

/// `{"forget_all": "ticks"}`
#[derive(Debug, Clone, Serialize)]
pub struct ForgetAllRequest<'a> {
    pub forget_all: &'a str,
}

impl Default for ForgetAllRequest<'_> {
    fn default() -> Self {
        Self {
            forget_all: TICKS_FEED_KEY,
        }
    }
}

/// `{"active_symbols": "brief", "product_type": "basic"}`
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSymbolsRequest<'a> {
    pub active_symbols: &'a str,
    pub product_type: &'a str,
}

impl Default for ActiveSymbolsRequest<'_> {
    fn default() -> Self {
        Self {
            active_symbols: "brief",
            product_type: "basic",
        }
    }
}

/// Tick payload of a `msg_type: "tick"` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct DerivTick {
    pub epoch: u64,
    #[serde(deserialize_with = "string_or_number_to_f64")]
    pub quote: f64,
    pub symbol: String,
    #[serde(default)]
    pub pip_size: Option<u32>,
}

impl From<DerivTick> for Tick {
    fn from(t: DerivTick) -> Self {
        Tick {
            symbol: t.symbol,
            quote: t.quote,
            epoch: t.epoch,
            pip_size: t.pip_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveSymbol {
    pub symbol: String,
    pub display_name: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub market_display_name: String,
    #[serde(default)]
    pub submarket: String,
    #[serde(default)]
    pub submarket_display_name: String,
    /// Smallest price increment, e.g. `0.001`.
    #[serde(default)]
    pub pip: Option<f64>,
}

impl ActiveSymbol {
    /// Decimal places implied by `pip` (`0.001` -> `3`).
    pub fn pip_size(&self) -> Option<u32> {
        self.pip.and_then(pip_to_decimals)
    }
}

pub fn pip_to_decimals(pip: f64) -> Option<u32> {
    if !pip.is_finite() || pip <= 0.0 || pip > 1.0 {
        return None;
    }
    let decimals = (-pip.log10()).round();
    (0.0..=28.0).contains(&decimals).then_some(decimals as u32)
}

/// `msg_type` discriminator of an inbound frame.
pub fn msg_type(message: &Value) -> Option<&str> {
    message.get("msg_type").and_then(Value::as_str)
}

/// API error carried by a frame, if any.
pub fn api_error(message: &Value) -> Option<ApiError> {
    message
        .get("error")
        .and_then(|e| ApiError::deserialize(e).ok())
}

/// Decode a `tick` frame.
pub fn parse_tick(message: &Value) -> Result<Tick, AppError> {
    if let Some(err) = api_error(message) {
        return Err(AppError::DerivApi {
            code: err.code,
            message: err.message,
        });
    }
    let payload = message
        .get("tick")
        .ok_or_else(|| AppError::Protocol("tick frame without tick payload".to_string()))?;
    let tick = DerivTick::deserialize(payload)?;
    Ok(tick.into())
}

/// Decode an `active_symbols` frame.
pub fn parse_active_symbols(message: &Value) -> Result<Vec<ActiveSymbol>, AppError> {
    if let Some(err) = api_error(message) {
        return Err(AppError::DerivApi {
            code: err.code,
            message: err.message,
        });
    }
    let payload = message.get("active_symbols").ok_or_else(|| {
        AppError::Protocol("active_symbols frame without symbol list".to_string())
    })?;
    Ok(Vec::<ActiveSymbol>::deserialize(payload)?)
}
