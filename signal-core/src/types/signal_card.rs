use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dashboard-facing signal built from a stored fetch snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCard {
    pub id: String,
    pub asset: String,
    #[serde(rename = "type")]
    pub trade_type: String,
    pub confidence: f64,
    pub timestamp: String,
    pub description: String,
    pub sources: Vec<String>,
    pub price: String,
    pub change: f64,
    #[serde(rename = "redditMentions")]
    pub reddit_mentions: u64,
    #[serde(rename = "newsArticles")]
    pub news_articles: u64,
    #[serde(rename = "socialSentiment")]
    pub social_sentiment: String,
}

impl SignalCard {
    /// Convert the `data` object of a snapshot. Returns `None` for an empty
    /// or non-object payload.
    pub fn from_snapshot_data(data: &Value) -> Option<Self> {
        let object = data.as_object().filter(|o| !o.is_empty())?;

        let text = |key: &str, default: &str| -> String {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };
        let number = |key: &str, default: f64| -> f64 {
            object.get(key).and_then(Value::as_f64).unwrap_or(default)
        };
        let count = |key: &str| -> u64 { object.get(key).and_then(Value::as_u64).unwrap_or(0) };

        let asset = text("asset", "");
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                let label = if asset.is_empty() { "UNKNOWN" } else { asset.as_str() };
                format!("{}_auto", label)
            });

        let sources = object
            .get("sources")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_else(|| vec!["news".to_string()]);

        Some(Self {
            id,
            trade_type: text("type", "HOLD").to_uppercase(),
            confidence: number("confidence", 50.0),
            timestamp: text("timestamp", "now"),
            description: text("description", ""),
            sources,
            price: text("price", "$0.00"),
            change: number("change", 0.0),
            reddit_mentions: count("redditMentions"),
            news_articles: count("newsArticles"),
            social_sentiment: text("socialSentiment", "neutral"),
            asset,
        })
    }
}
