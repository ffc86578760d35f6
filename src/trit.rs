//! The ternary value used throughout the detector: a pixel is `Brighter`,
//! `Darker`, or `Similar` relative to some reference intensity.

use std::fmt;

use crate::error::ParseError;

/// One of three symbolic comparison results.
///
/// Decoded from ASCII only at serialization boundaries (feature files,
/// descriptor strings) — everywhere else this enum is used directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trit {
    Brighter,
    Darker,
    Similar,
}

impl Trit {
    /// Classify an offset pixel `p` against centre `c` and threshold `b`.
    pub fn classify(p: i32, c: i32, b: i32) -> Trit {
        if p > c + b {
            Trit::Brighter
        } else if p < c - b {
            Trit::Darker
        } else {
            Trit::Similar
        }
    }

    pub fn to_ascii(self) -> char {
        match self {
            Trit::Brighter => 'b',
            Trit::Darker => 'd',
            Trit::Similar => 's',
        }
    }

    pub fn from_ascii(c: char) -> Result<Trit, ParseError> {
        match c {
            'b' => Ok(Trit::Brighter),
            'd' => Ok(Trit::Darker),
            's' => Ok(Trit::Similar),
            _ => Err(ParseError::BadTrit(c.to_string())),
        }
    }
}

impl fmt::Display for Trit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ascii())
    }
}

/// Parse a descriptor string of `b`/`d`/`s` characters into trits.
pub fn parse_descriptor(s: &str) -> Result<Vec<Trit>, ParseError> {
    s.chars().map(Trit::from_ascii).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        assert_eq!(Trit::classify(110, 100, 9), Trit::Brighter);
        assert_eq!(Trit::classify(109, 100, 9), Trit::Similar);
        assert_eq!(Trit::classify(91, 100, 9), Trit::Similar);
        assert_eq!(Trit::classify(90, 100, 9), Trit::Darker);
    }

    #[test]
    fn ascii_roundtrip() {
        for t in [Trit::Brighter, Trit::Darker, Trit::Similar] {
            assert_eq!(Trit::from_ascii(t.to_ascii()).unwrap(), t);
        }
    }

    #[test]
    fn parse_descriptor_rejects_bad_char() {
        assert!(parse_descriptor("bdsx").is_err());
    }

    #[test]
    fn parse_descriptor_ok() {
        assert_eq!(
            parse_descriptor("bds").unwrap(),
            vec![Trit::Brighter, Trit::Darker, Trit::Similar]
        );
    }
}
