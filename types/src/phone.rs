//! Phone numbers of accredited voters.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// A normalised phone number: an optional leading `+` followed by 7 to 15
/// digits. Spaces, dashes, dots and parentheses are stripped on parse.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub const MIN_DIGITS: usize = 7;
    pub const MAX_DIGITS: usize = 15;

    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let trimmed = raw.trim();
        let (plus, rest) = match trimmed.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(TypesError::InvalidPhone(raw.to_string())),
            }
        }

        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(TypesError::InvalidPhone(raw.to_string()));
        }

        if plus {
            digits.insert(0, '+');
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form safe for logs: everything but the last four digits replaced.
    pub fn masked(&self) -> String {
        let keep = 4.min(self.0.len());
        let (head, tail) = self.0.split_at(self.0.len() - keep);
        format!("{}{}", "*".repeat(head.len()), tail)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
