//! System prompts and the per-symbol analysis prompt

pub const STOCK_ANALYZER: &str = "stock_analyzer";
pub const DEFAULT_TEMPLATE: &str = "default";

const STOCK_ANALYZER_PROMPT: &str = r#"You are a professional stock analyst. Use the $web_search tool to look up the latest real-time information before answering.

Return ONLY a valid JSON object with these fields:
- id: unique identifier for this signal
- asset: stock ticker
- type: one of BUY, SELL, HOLD
- confidence: integer between 0 and 100
- signal: one of bullish, bearish, neutral
- timestamp: how recent the underlying news is, e.g. "2 hours ago"
- description: short summary of the reasoning
- sources: list of source kinds used, e.g. ["news", "social"]
- price: current price formatted as "$<number>"
- change: percent change as a number
- newsArticles: number of relevant news articles found
- socialSentiment: one of very_positive, positive, neutral, negative, very_negative

Do not add any text outside the JSON object."#;

const DEFAULT_PROMPT: &str =
    "You are a JSON response generator. Return ONLY a valid JSON object with no additional text.";

/// System prompt for a template name. Unknown names fall back to `default`.
pub fn system_prompt(template: &str) -> &'static str {
    match template {
        STOCK_ANALYZER => STOCK_ANALYZER_PROMPT,
        DEFAULT_TEMPLATE => DEFAULT_PROMPT,
        other => {
            tracing::debug!("Unknown template '{}', using default", other);
            DEFAULT_PROMPT
        }
    }
}

/// User prompt asking for the latest data on one ticker
pub fn stock_analysis_prompt(symbol: &str) -> String {
    format!(
        r#"Search for the latest real-time data on {symbol} stock and provide:
1. Current price and today's percent change
2. At least 3 recent news items and their impact
3. Social media sentiment
4. Trading volume
5. Analyst views

Return a JSON object with: asset, price, change, signal, confidence, description, newsArticles, socialSentiment.
The asset field must be "{symbol}"."#
    )
}
