use std::collections::HashMap;

use serde::Serialize;

/// A registered token. The registry is built once at boot and never
/// mutated afterward — process-wide, immutable after init.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    pub total_supply: u128,
    pub decimals: u8,
}

/// Fixed six-token registry: CRWN, USDT, ETH, BTC, TRIT, KRW.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: HashMap<String, Token>,
}

impl TokenRegistry {
    pub fn bootstrap() -> Self {
        let specs: [(&str, &str, u128); 6] = [
            ("CRWN", "Crowny", 1_000_000_000_000),
            ("USDT", "Tether USD", 1_000_000_000_000),
            ("ETH", "Ether", 120_000_000),
            ("BTC", "Bitcoin", 21_000_000),
            ("TRIT", "Trit", 10_000_000_000),
            ("KRW", "Korean Won (wrapped)", 10_000_000_000_000),
        ];
        let mut tokens = HashMap::new();
        for (symbol, name, total_supply) in specs {
            tokens.insert(
                symbol.to_string(),
                Token {
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                    total_supply,
                    decimals: 9,
                },
            );
        }
        Self { tokens }
    }

    pub fn get(&self, symbol: &str) -> Option<&Token> {
        self.tokens.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.tokens.contains_key(symbol)
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.tokens.keys().map(|s| s.as_str()).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }
}

/// Starting wallet balances credited to every newly registered principal.
/// Expressed in the same integer unit as pool reserves (see
/// `dex::mod::POOL_SEEDS`) — the `decimals` field is informational
/// metadata and is never used as a scaling factor anywhere a balance
/// meets a reserve, so wallets and pools share one flat integer space
/// rather than wallets living in "smallest units" and pools in
/// whole-token units.
pub fn default_mint() -> Vec<(&'static str, u128)> {
    vec![
        ("CRWN", 1_000_000),
        ("USDT", 500_000),
        ("ETH", 100),
        ("BTC", 5),
        ("KRW", 100_000_000),
    ]
}
