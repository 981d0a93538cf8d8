//! Quote pool shown on the overlay.

use rand::Rng;

pub const ATTRIBUTION: &str = "Developer Wisdom";

pub const BUILTIN_QUOTES: [&str; 8] = [
    "Code is poetry written in logic.",
    "The best error message is the one that never shows up.",
    "Simplicity is the ultimate sophistication.",
    "First, solve the problem. Then, write the code.",
    "Code never lies, comments sometimes do.",
    "The most important property of a program is whether it accomplishes the intention of its user.",
    "Programming isn't about what you know; it's about what you can figure out.",
    "Clean code always looks like it was written by someone who cares.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePool {
    quotes: Vec<String>,
}

impl QuotePool {
    pub fn builtin() -> Self {
        Self {
            quotes: BUILTIN_QUOTES.iter().map(|q| q.to_string()).collect(),
        }
    }

    /// Pool from configured quotes; blank entries are dropped and an empty
    /// result falls back to the built-in pool.
    pub fn from_custom(quotes: &[String]) -> Self {
        let quotes: Vec<String> = quotes
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .collect();

        if quotes.is_empty() {
            Self::builtin()
        } else {
            Self { quotes }
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn quotes(&self) -> &[String] {
        &self.quotes
    }

    /// Uniformly random quote.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.quotes[rng.gen_range(0..self.quotes.len())]
    }
}

impl Default for QuotePool {
    fn default() -> Self {
        Self::builtin()
    }
}
