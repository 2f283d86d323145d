use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error text carried by synthetic failure records
pub const FETCH_FAILED_MESSAGE: &str = "data fetch failed";

/// Directional signal reported by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Signal {
    /// Case-insensitive parse; unknown labels yield `None`
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "bullish" => Some(Signal::Bullish),
            "bearish" => Some(Signal::Bearish),
            "neutral" => Some(Signal::Neutral),
            _ => None,
        }
    }
}

/// Five-level social media sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialSentiment {
    VeryPositive,
    Positive,
    #[default]
    Neutral,
    Negative,
    VeryNegative,
}

impl SocialSentiment {
    /// Accepts `very_positive`, `very positive`, `Very-Positive`, ...
    pub fn parse(label: &str) -> Option<Self> {
        let canonical: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match canonical.as_str() {
            "very_positive" => Some(SocialSentiment::VeryPositive),
            "positive" => Some(SocialSentiment::Positive),
            "neutral" => Some(SocialSentiment::Neutral),
            "negative" => Some(SocialSentiment::Negative),
            "very_negative" => Some(SocialSentiment::VeryNegative),
            _ => None,
        }
    }
}

/// Values substituted for any field the model omitted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisDefaults {
    pub price: &'static str,
    pub change: f64,
    pub signal: Signal,
    pub confidence: u8,
    pub news_articles: u32,
    pub social_sentiment: SocialSentiment,
}

impl AnalysisDefaults {
    /// Description used when the model gave none
    pub fn description(&self, symbol: &str) -> String {
        format!("{} stock analysis", symbol)
    }
}

pub const DEFAULTS: AnalysisDefaults = AnalysisDefaults {
    price: "N/A",
    change: 0.0,
    signal: Signal::Neutral,
    confidence: 50,
    news_articles: 0,
    social_sentiment: SocialSentiment::Neutral,
};

/// Model output as parsed, every field optional.
///
/// A field that is present but unusable (wrong type, unknown label) is
/// left as `None` so the default table applies to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAnalysis {
    pub id: Option<String>,
    pub asset: Option<String>,
    pub trade_type: Option<String>,
    pub price: Option<String>,
    pub change: Option<f64>,
    pub signal: Option<Signal>,
    pub confidence: Option<u8>,
    pub description: Option<String>,
    pub news_articles: Option<u32>,
    pub social_sentiment: Option<SocialSentiment>,
    pub news_timestamp: Option<String>,
    pub sources: Option<Vec<String>>,
}

impl RawAnalysis {
    /// Parse a gateway response.
    ///
    /// Returns `None` when the value is not a JSON object or carries an
    /// `error` key; both count as a failed attempt.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.contains_key("error") {
            return None;
        }

        Some(Self {
            id: text_field(object, "id"),
            asset: text_field(object, "asset"),
            trade_type: text_field(object, "type").map(|t| t.to_uppercase()),
            price: object.get("price").and_then(parse_price),
            change: object.get("change").and_then(parse_number),
            signal: object
                .get("signal")
                .and_then(Value::as_str)
                .and_then(Signal::parse),
            confidence: object
                .get("confidence")
                .and_then(parse_number)
                .map(|c| c.round().clamp(0.0, 100.0) as u8),
            description: text_field(object, "description"),
            news_articles: object
                .get("newsArticles")
                .and_then(parse_number)
                .map(|n| n.round().max(0.0) as u32),
            social_sentiment: object
                .get("socialSentiment")
                .and_then(Value::as_str)
                .and_then(SocialSentiment::parse),
            news_timestamp: text_field(object, "timestamp"),
            sources: object.get("sources").and_then(Value::as_array).map(|items| {
                items
                    .iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            }),
        })
    }
}

/// Fully populated analysis for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub trade_type: Option<String>,
    pub price: String,
    pub change: f64,
    pub signal: Signal,
    pub confidence: u8,
    pub description: String,
    #[serde(rename = "newsArticles")]
    pub news_articles: u32,
    #[serde(rename = "socialSentiment")]
    pub social_sentiment: SocialSentiment,
    /// How recent the underlying news is, as phrased by the model
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub news_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

/// Map a partially filled model response onto a complete analysis using [`DEFAULTS`]
pub fn normalize_analysis(symbol: &str, raw: RawAnalysis) -> StockAnalysis {
    StockAnalysis {
        id: raw.id,
        asset: raw.asset,
        trade_type: raw.trade_type,
        price: raw.price.unwrap_or_else(|| DEFAULTS.price.to_string()),
        change: raw.change.unwrap_or(DEFAULTS.change),
        signal: raw.signal.unwrap_or(DEFAULTS.signal),
        confidence: raw.confidence.unwrap_or(DEFAULTS.confidence),
        description: raw
            .description
            .unwrap_or_else(|| DEFAULTS.description(symbol)),
        news_articles: raw.news_articles.unwrap_or(DEFAULTS.news_articles),
        social_sentiment: raw.social_sentiment.unwrap_or(DEFAULTS.social_sentiment),
        news_timestamp: raw.news_timestamp,
        sources: raw.sources.unwrap_or_default(),
    }
}

/// One symbol's fetch result.
///
/// Successful records carry a complete [`StockAnalysis`]; failed ones only
/// guarantee `symbol`, `fetch_success = false` and `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub symbol: String,
    pub fetch_success: bool,
    pub fetch_timestamp: Timestamp,
    #[serde(flatten)]
    pub analysis: Option<StockAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StockRecord {
    pub fn success(symbol: impl Into<String>, analysis: StockAnalysis, at: Timestamp) -> Self {
        Self {
            symbol: symbol.into(),
            fetch_success: true,
            fetch_timestamp: at,
            analysis: Some(analysis),
            error: None,
        }
    }

    pub fn failure(symbol: impl Into<String>, error: impl Into<String>, at: Timestamp) -> Self {
        Self {
            symbol: symbol.into(),
            fetch_success: false,
            fetch_timestamp: at,
            analysis: None,
            error: Some(error.into()),
        }
    }

    /// Percent change, only for successful records
    pub fn change(&self) -> Option<f64> {
        self.analysis.as_ref().map(|a| a.change)
    }

    pub fn is_success(&self) -> bool {
        self.fetch_success && self.analysis.is_some()
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers, or strings such as "+1.25%" / "3"
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != ',' && *c != '+')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn parse_price(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => n.as_f64().map(|p| format!("${:.2}", p)),
        _ => None,
    }
}
