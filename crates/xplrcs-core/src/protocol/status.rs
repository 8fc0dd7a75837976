//! Status line tokenizing
//!
//! A device line such as `A=1 O=1 Z=1 T=72 SP=70 M=H FM=0` is broken into an
//! ordered list of `KEY=VALUE` tokens.

use super::MAX_TOKENS;

/// An ordered, tokenized device line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLine {
    tokens: Vec<String>,
}

impl StatusLine {
    /// Tokenize a line on spaces, keeping at most [`MAX_TOKENS`] tokens
    pub fn parse(line: &str) -> Self {
        let tokens = line
            .split(' ')
            .filter(|t| !t.is_empty())
            .take(MAX_TOKENS)
            .map(str::to_string)
            .collect();
        Self { tokens }
    }

    /// All tokens in line order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True for an empty line
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token at a position, if present
    pub fn get(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    /// Value of the first token whose key matches exactly
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.tokens
            .iter()
            .filter_map(|t| split_token(t))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// Split a token at its first `=`, `None` when there is no `=`
pub fn split_token(token: &str) -> Option<(&str, &str)> {
    token.split_once('=')
}
