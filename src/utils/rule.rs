use crate::{Error, Result};
use std::{fmt, str::FromStr};

/// Outer-totalistic Life-like rule in `B.../S...` notation.
///
/// Birth and survival conditions are stored as bitmasks over neighbour
/// counts `0..=8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    birth: u16,
    survival: u16,
}

impl Rule {
    /// Conway's Game of Life, `B3/S23`.
    pub const CONWAY: Rule = Rule {
        birth: 1 << 3,
        survival: 1 << 2 | 1 << 3,
    };

    /// Builds a rule from neighbour counts.
    ///
    /// Birth on zero neighbours is rejected: it would fill the whole
    /// unbounded plane, which a sparse set cannot represent.
    pub fn new(birth: &[u8], survival: &[u8]) -> Result<Self> {
        let mask = |counts: &[u8], kind: char| -> Result<u16> {
            counts.iter().try_fold(0u16, |acc, &n| {
                if n > 8 {
                    Err(Error::InvalidRule(format!(
                        "{kind}{n}: neighbour count must be in 0..=8"
                    )))
                } else {
                    Ok(acc | 1 << n)
                }
            })
        };
        let rule = Self {
            birth: mask(birth, 'B')?,
            survival: mask(survival, 'S')?,
        };
        if rule.birth & 1 != 0 {
            return Err(Error::InvalidRule(
                "B0 rules are not supported on an unbounded plane".to_string(),
            ));
        }
        Ok(rule)
    }

    pub fn birth_mask(&self) -> u16 {
        self.birth
    }

    pub fn survival_mask(&self) -> u16 {
        self.survival
    }

    /// Next state of a cell given its state and the number of live neighbours.
    #[inline]
    pub fn next_state(&self, alive: bool, neighbors: u8) -> bool {
        let mask = if alive { self.survival } else { self.birth };
        mask >> neighbors & 1 != 0
    }

    fn parse_digits(part: &str, full: &str) -> Result<Vec<u8>> {
        part.chars()
            .map(|c| {
                c.to_digit(10)
                    .map(|d| d as u8)
                    .ok_or_else(|| Error::InvalidRule(format!("unexpected '{c}' in '{full}'")))
            })
            .collect()
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::CONWAY
    }
}

impl FromStr for Rule {
    type Err = Error;

    /// Accepts `B3/S23`, `S23/B3` (any case) and the legacy `23/3`
    /// (survival/birth) notation.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split('/').map(str::trim).collect();
        let [first, second] = parts[..] else {
            return Err(Error::InvalidRule(format!(
                "'{trimmed}': expected two parts separated by '/'"
            )));
        };

        let tagged = |p: &str| -> Option<(char, String)> {
            let mut chars = p.chars();
            let tag = chars.next()?.to_ascii_uppercase();
            matches!(tag, 'B' | 'S').then(|| (tag, chars.collect()))
        };

        let (birth, survival) = match (tagged(first), tagged(second)) {
            (Some(('B', b)), Some(('S', s))) | (Some(('S', s)), Some(('B', b))) => (b, s),
            (None, None) => (second.to_string(), first.to_string()),
            _ => {
                return Err(Error::InvalidRule(format!(
                    "'{trimmed}': expected one B part and one S part"
                )))
            }
        };

        Self::new(
            &Self::parse_digits(&birth, trimmed)?,
            &Self::parse_digits(&survival, trimmed)?,
        )
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = |mask: u16| -> String {
            (0..=8)
                .filter(|n| mask >> n & 1 != 0)
                .map(|n| char::from(b'0' + n as u8))
                .collect()
        };
        write!(f, "B{}/S{}", digits(self.birth), digits(self.survival))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_notations() {
        for s in ["B3/S23", "b3/s23", "S23/B3", "23/3", " B3 / S23 "] {
            assert_eq!(s.parse::<Rule>().unwrap(), Rule::CONWAY, "{s}");
        }
        let highlife: Rule = "B36/S23".parse().unwrap();
        assert_eq!(highlife.to_string(), "B36/S23");
        let seeds: Rule = "B2/S".parse().unwrap();
        assert!(!seeds.next_state(true, 2));
        assert!(seeds.next_state(false, 2));
    }

    #[test]
    fn rejects_malformed_rules() {
        for s in ["", "B3", "B3/S23/X", "B9/S23", "B3/Q23", "B3/B23", "Bx/S23", "B03/S23"] {
            assert!(
                matches!(s.parse::<Rule>(), Err(Error::InvalidRule(_))),
                "'{s}' should be rejected"
            );
        }
    }

    #[test]
    fn conway_transitions() {
        let r = Rule::CONWAY;
        assert!(r.next_state(false, 3));
        assert!(!r.next_state(false, 2));
        assert!(r.next_state(true, 2));
        assert!(r.next_state(true, 3));
        assert!(!r.next_state(true, 4));
        assert!(!r.next_state(true, 1));
    }
}
