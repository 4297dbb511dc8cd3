//! Ticker symbol normalization and share references.
use std::fmt::Display;

/// A tracked ticker: the provider lookup key and the short name shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub raw: String,
    pub display: String,
}

impl SymbolKey {
    /// Normalizes a user-entered ticker.
    ///
    /// The input is trimmed and uppercased to form the lookup key. The display
    /// name drops the exchange suffix (`3350.T` -> `3350`) and anything after
    /// the first `-` (`BTC-USD` -> `BTC`). Inputs made only of a suffix keep
    /// their uppercased form as display name.
    pub fn normalize(input: &str) -> Self {
        let raw = input.trim().to_uppercase();
        SymbolKey {
            display: display_name(&raw),
            raw,
        }
    }
}

impl Display for SymbolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn display_name(raw: &str) -> String {
    let without_exchange = raw.split('.').next().unwrap_or(raw);
    let base = without_exchange.split('-').next().unwrap_or(without_exchange);
    if base.is_empty() {
        raw.to_string()
    } else {
        base.to_string()
    }
}

/// Encodes a tracked symbol list as a comma separated reference.
pub fn encode_share_reference(symbols: &[SymbolKey]) -> String {
    symbols
        .iter()
        .map(|s| s.raw.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes a share reference, skipping blanks and repeated lookup keys.
pub fn decode_share_reference(reference: &str) -> Vec<SymbolKey> {
    let mut symbols: Vec<SymbolKey> = Vec::new();
    for part in reference.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let key = SymbolKey::normalize(part);
        if !symbols.iter().any(|s| s.raw == key.raw) {
            symbols.push(key);
        }
    }
    symbols
}
