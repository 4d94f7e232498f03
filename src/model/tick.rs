use serde::Serialize;

/// One quote observed on a Deriv tick stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub symbol: String,
    pub quote: f64,
    pub epoch: u64,
    /// Display precision of the symbol. `None` falls back to the engine default.
    pub pip_size: Option<u32>,
}

impl Tick {
    /// Create a bare tick from a quote and its display precision.
    pub fn from_quote(quote: f64, pip_size: u32) -> Self {
        Self {
            symbol: String::new(),
            quote,
            epoch: 0,
            pip_size: Some(pip_size),
        }
    }
}
