use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    EvenOdd,
    OverUnder,
    Matches,
    Differs,
    RiseFall,
    ProEvenOdd,
    ProOverUnder,
    ProDiffers,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EvenOdd => "even_odd",
            Self::OverUnder => "over_under",
            Self::Matches => "matches",
            Self::Differs => "differs",
            Self::RiseFall => "rise_fall",
            Self::ProEvenOdd => "pro_even_odd",
            Self::ProOverUnder => "pro_over_under",
            Self::ProDiffers => "pro_differs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalStatus {
    #[serde(rename = "TRADE NOW")]
    TradeNow,
    #[serde(rename = "WAIT")]
    Wait,
    #[serde(rename = "NEUTRAL")]
    Neutral,
}

impl SignalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TradeNow => "TRADE NOW",
            Self::Wait => "WAIT",
            Self::Neutral => "NEUTRAL",
        }
    }
}

/// Verdict of a single rule evaluation. Rebuilt on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub status: SignalStatus,
    pub probability: f64,
    pub recommendation: String,
    pub entry_condition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_digit: Option<u8>,
}

impl Signal {
    pub fn new(
        kind: SignalKind,
        status: SignalStatus,
        probability: f64,
        recommendation: impl Into<String>,
        entry_condition: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            status,
            probability,
            recommendation: recommendation.into(),
            entry_condition: entry_condition.into(),
            target_digit: None,
        }
    }

    pub fn neutral(
        kind: SignalKind,
        probability: f64,
        recommendation: impl Into<String>,
        entry_condition: impl Into<String>,
    ) -> Self {
        Self::new(
            kind,
            SignalStatus::Neutral,
            probability,
            recommendation,
            entry_condition,
        )
    }

    pub fn with_target(mut self, digit: u8) -> Self {
        self.target_digit = Some(digit);
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.status != SignalStatus::Neutral
    }
}
