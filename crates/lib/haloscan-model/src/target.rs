use std::{error::Error, fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::models::AnalysisMode;

pub const MAX_KEYWORD_CHARS: usize = 200;
pub const MAX_DOMAIN_CHARS: usize = 253;

static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$")
        .expect("valid domain pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTargetError {
    Empty,
    TooLong { max: usize },
    ControlCharacters,
    InvalidDomain(String),
}

impl fmt::Display for InvalidTargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("analysis target is empty"),
            Self::TooLong { max } => write!(f, "analysis target exceeds {max} characters"),
            Self::ControlCharacters => f.write_str("analysis target contains control characters"),
            Self::InvalidDomain(value) => write!(f, "not a valid domain name: {value}"),
        }
    }
}

impl Error for InvalidTargetError {}

/// Validated domain or keyword an analysis runs against.
///
/// Only constructed through [`AnalysisTarget::parse`], so a value in hand is
/// always trimmed, non-empty and well-formed for its mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AnalysisTarget {
    value: String,
    mode: AnalysisMode,
}

impl AnalysisTarget {
    /// Validates and normalizes a raw target for the given mode.
    ///
    /// Domains are lowercased with scheme, port, path and a leading `www.`
    /// removed.
    ///
    /// # Errors
    /// Returns `InvalidTargetError` if the input is empty or malformed.
    pub fn parse(raw: &str, mode: AnalysisMode) -> Result<Self, InvalidTargetError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidTargetError::Empty);
        }
        if trimmed.chars().any(char::is_control) {
            return Err(InvalidTargetError::ControlCharacters);
        }

        let value = match mode {
            AnalysisMode::Domain => parse_domain(trimmed)?,
            AnalysisMode::Keyword => {
                if trimmed.chars().count() > MAX_KEYWORD_CHARS {
                    return Err(InvalidTargetError::TooLong {
                        max: MAX_KEYWORD_CHARS,
                    });
                }
                trimmed.to_string()
            }
        };

        Ok(Self { value, mode })
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub const fn mode(&self) -> AnalysisMode {
        self.mode
    }
}

impl fmt::Display for AnalysisTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

fn parse_domain(raw: &str) -> Result<String, InvalidTargetError> {
    let lower = raw.to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    };
    let host = host.strip_prefix("www.").unwrap_or(host).trim_end_matches('.');

    if host.is_empty() {
        return Err(InvalidTargetError::Empty);
    }
    if host.len() > MAX_DOMAIN_CHARS {
        return Err(InvalidTargetError::TooLong {
            max: MAX_DOMAIN_CHARS,
        });
    }
    if !DOMAIN_PATTERN.is_match(host) {
        return Err(InvalidTargetError::InvalidDomain(raw.to_string()));
    }
    Ok(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_targets_are_normalized() {
        let cases = [
            ("example.com", "example.com"),
            ("  Example.COM ", "example.com"),
            ("https://www.example.com/blog?page=2", "example.com"),
            ("http://shop.example.co.uk:8080/", "shop.example.co.uk"),
            ("www.lemonde.fr.", "lemonde.fr"),
        ];
        for (raw, expected) in cases {
            let target = AnalysisTarget::parse(raw, AnalysisMode::Domain)
                .unwrap_or_else(|err| panic!("{raw} should parse: {err}"));
            assert_eq!(target.value(), expected);
            assert_eq!(target.mode(), AnalysisMode::Domain);
        }
    }

    #[test]
    fn empty_targets_are_rejected_in_every_mode() {
        for mode in [AnalysisMode::Domain, AnalysisMode::Keyword] {
            assert_eq!(AnalysisTarget::parse("", mode), Err(InvalidTargetError::Empty));
            assert_eq!(AnalysisTarget::parse("   ", mode), Err(InvalidTargetError::Empty));
        }
        assert_eq!(
            AnalysisTarget::parse("https://", AnalysisMode::Domain),
            Err(InvalidTargetError::Empty)
        );
    }

    #[test]
    fn malformed_domains_are_rejected() {
        for raw in ["localhost", "exa mple.com", "-bad.com", "example.c0m", "example..com"] {
            assert!(
                matches!(
                    AnalysisTarget::parse(raw, AnalysisMode::Domain),
                    Err(InvalidTargetError::InvalidDomain(_))
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn keyword_targets_keep_their_text() {
        let target = AnalysisTarget::parse("  chaussures de running ", AnalysisMode::Keyword)
            .expect("keyword should parse");
        assert_eq!(target.value(), "chaussures de running");

        let long = "a".repeat(MAX_KEYWORD_CHARS + 1);
        assert_eq!(
            AnalysisTarget::parse(&long, AnalysisMode::Keyword),
            Err(InvalidTargetError::TooLong {
                max: MAX_KEYWORD_CHARS
            })
        );
        assert_eq!(
            AnalysisTarget::parse("bad\u{7}keyword", AnalysisMode::Keyword),
            Err(InvalidTargetError::ControlCharacters)
        );
    }
}
