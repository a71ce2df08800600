//! Pattern templates: SQL fragments with `?1..?n` argument slots.
//!
//! `substring(?1 from ?2 for ?3)` renders its first argument where `?1`
//! appears, and so on. Slots may repeat or appear out of order.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static SLOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?(\d+)").expect("valid slot regex"));

/// A piece of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternPart {
    Literal(String),
    /// 0-based argument index.
    Argument(usize),
}

/// A pattern that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid function pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTemplate {
    source: String,
    parts: Vec<PatternPart>,
}

impl PatternTemplate {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut parts = Vec::new();
        let mut last = 0;
        for captures in SLOT.captures_iter(pattern) {
            let (Some(whole), Some(digits)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let slot: usize = digits.as_str().parse().map_err(|_| PatternError {
                pattern: pattern.to_string(),
                reason: format!("slot '{}' is out of range", whole.as_str()),
            })?;
            if slot == 0 {
                return Err(PatternError {
                    pattern: pattern.to_string(),
                    reason: "slots are numbered from ?1".into(),
                });
            }
            if whole.start() > last {
                parts.push(PatternPart::Literal(pattern[last..whole.start()].to_string()));
            }
            parts.push(PatternPart::Argument(slot - 1));
            last = whole.end();
        }
        if last < pattern.len() {
            parts.push(PatternPart::Literal(pattern[last..].to_string()));
        }
        Ok(Self {
            source: pattern.to_string(),
            parts,
        })
    }

    pub fn parts(&self) -> &[PatternPart] {
        &self.parts
    }

    /// Number of arguments the pattern needs (the highest slot number).
    pub fn arity(&self) -> usize {
        self.parts
            .iter()
            .filter_map(|part| match part {
                PatternPart::Argument(i) => Some(i + 1),
                PatternPart::Literal(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Fill the slots with pre-rendered argument text.
    pub fn render_with(&self, args: &[&str]) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                PatternPart::Literal(text) => out.push_str(text),
                PatternPart::Argument(i) => {
                    if let Some(arg) = args.get(*i) {
                        out.push_str(arg);
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for PatternTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
