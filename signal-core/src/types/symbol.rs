use crate::error::CoreError;
use serde::Serialize;
use std::fmt;

/// Tickers recognised out of the box
pub const DEFAULT_SYMBOLS: [&str; 30] = [
    "AAPL", "TSLA", "NVDA", "MSFT", "GOOGL", "AMZN", "META", "NFLX", "BABA", "JPM", "V", "MA",
    "DIS", "PYPL", "ADBE", "CRM", "ORCL", "INTC", "AMD", "CSCO", "UBER", "LYFT", "SQ", "SHOP",
    "ZM", "TWTR", "SNAP", "PINS", "ROKU", "DOCU",
];

/// A ticker that has been checked against a [`SymbolUniverse`].
///
/// The only ways to obtain one are [`SymbolUniverse::resolve`] and the
/// universe iterators, so anything holding a `Symbol` can skip validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cache key under which a symbol's latest record is stored
    pub fn cache_key(&self) -> String {
        format!("stock_{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered, fixed set of tickers the system will fetch data for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolUniverse {
    symbols: Vec<Symbol>,
}

impl SymbolUniverse {
    /// Build a universe from raw tickers. Input is trimmed and upper-cased;
    /// blanks and duplicates are dropped, first occurrence wins.
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symbols: Vec<Symbol> = Vec::new();
        for raw in tickers {
            let ticker = normalize_ticker(raw.as_ref());
            if ticker.is_empty() || symbols.iter().any(|s| s.0 == ticker) {
                continue;
            }
            symbols.push(Symbol(ticker));
        }
        Self { symbols }
    }

    /// Validate a raw ticker against the universe
    pub fn resolve(&self, raw: &str) -> Result<Symbol, CoreError> {
        let ticker = normalize_ticker(raw);
        if ticker.is_empty() {
            return Err(CoreError::EmptySymbol);
        }

        self.symbols
            .iter()
            .find(|s| s.0 == ticker)
            .cloned()
            .ok_or(CoreError::UnknownSymbol(ticker))
    }

    /// Resolve every ticker, failing on the first one outside the universe
    pub fn resolve_all<S: AsRef<str>>(&self, raws: &[S]) -> Result<Vec<Symbol>, CoreError> {
        raws.iter().map(|raw| self.resolve(raw.as_ref())).collect()
    }

    /// Split raw tickers into recognised symbols and rejected (normalised) inputs
    pub fn partition<S: AsRef<str>>(&self, raws: &[S]) -> (Vec<Symbol>, Vec<String>) {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();

        for raw in raws {
            match self.resolve(raw.as_ref()) {
                Ok(symbol) => valid.push(symbol),
                Err(_) => invalid.push(normalize_ticker(raw.as_ref())),
            }
        }

        (valid, invalid)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.resolve(raw).is_ok()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl Default for SymbolUniverse {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOLS)
    }
}

fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}
