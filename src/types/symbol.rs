use serde::{Deserialize, Serialize};
use std::fmt;

pub type SymbolName = String;

/// Identifies a tradeable security. The feed engine never interprets
/// `name` beyond equality and hashing — the reader and calendar
/// collaborators are the ones that know how to turn it into a file path or
/// a trading-hours lookup.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Symbol {
    pub name: SymbolName,
}

impl Symbol {
    pub fn new(name: impl Into<SymbolName>) -> Self {
        Symbol { name: name.into() }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::new(value)
    }
}
