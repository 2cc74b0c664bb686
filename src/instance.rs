//! Problem instances and their text format.
//!
//! ## Format
//!
//! ```text
//! additive
//! 3 4
//! 8 6 4 2
//! 2 4 6 8
//! 5 5 5 5
//! ```
//!
//! - Line 1: space-separated restriction tags; unknown tags are ignored
//! - Line 2: agent count `n` and item count `m`
//! - Next `n` lines: agent `i`'s valuations of items `1..=m`
//!
//! Blank lines and surrounding whitespace are ignored. Lines after the `n`-th
//! valuation line are ignored.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Agent, AgentId, Agents, ItemId, Items, Valuation, ValuationError};

/// Restriction tags recognised in line 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    /// Valuations are additive over bundles.
    Additive,
}

impl Restriction {
    /// The tag as written in instance files.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Additive => "additive",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "additive" => Some(Self::Additive),
            _ => None,
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error type for instance import.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The file could not be read.
    #[error("Failed to read instance: {0}")]
    Io(#[from] std::io::Error),
    /// The restrictions or header line is absent.
    #[error("Missing {0} line")]
    MissingLine(&'static str),
    /// Line 2 does not hold exactly two tokens.
    #[error("Expected agent and item counts in line 2, got {0:?}")]
    InvalidHeader(String),
    /// A token is not a non-negative integer.
    #[error("Invalid integer {token:?} in line {line}")]
    InvalidInteger {
        /// 1-based line number among non-blank lines.
        line: usize,
        /// Offending token.
        token: String,
    },
    /// Fewer valuation lines than agents.
    #[error("Expected {expected} valuation lines, found {found}")]
    TooFewValuationLines {
        /// Agent count from the header.
        expected: usize,
        /// Valuation lines present.
        found: usize,
    },
    /// A valuation line does not hold one value per item.
    #[error("Expected {expected} valuations in line {line}, found {found}")]
    WrongValuationCount {
        /// 1-based line number among non-blank lines.
        line: usize,
        /// Item count from the header.
        expected: usize,
        /// Values present.
        found: usize,
    },
    /// Only additive valuations can be read from the matrix.
    #[error("Instance does not declare the additive restriction")]
    MissingAdditiveRestriction,
    /// Items were declared but nobody can receive them.
    #[error("Instance declares {items} items but no agents")]
    NoAgents {
        /// Item count from the header.
        items: usize,
    },
}

/// Agents, items and the restrictions their valuations obey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Agents `1..=n`.
    pub agents: Agents,
    /// Items `1..=m`.
    pub items: Items,
    /// Restrictions declared by the instance.
    pub restrictions: Vec<Restriction>,
}

impl Instance {
    /// Additive instance with agents `1..=n` and items `1..=m` from a matrix.
    ///
    /// Every row must have the same length.
    pub fn from_matrix(rows: &[Vec<Valuation>]) -> Self {
        let items = rows.first().map_or(0, Vec::len);
        Self {
            agents: Agents::from_matrix(rows),
            items: Items::range(1, items),
            restrictions: vec![Restriction::Additive],
        }
    }

    /// Parse the text format.
    pub fn parse(text: &str) -> Result<Self, ImportError> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let tags = lines.first().ok_or(ImportError::MissingLine("restrictions"))?;
        let mut restrictions: Vec<Restriction> =
            tags.split_whitespace().filter_map(Restriction::from_tag).collect();
        restrictions.sort();
        restrictions.dedup();

        let header = lines.get(1).ok_or(ImportError::MissingLine("header"))?;
        let counts = parse_integers(header, 2)?;
        let [n, m] = counts[..] else {
            return Err(ImportError::InvalidHeader(header.to_string()));
        };
        let (Ok(n), Ok(m)) = (usize::try_from(n), usize::try_from(m)) else {
            return Err(ImportError::InvalidHeader(header.to_string()));
        };

        // lines holds at least the two lines read above
        let valuation_lines = lines.len() - 2;
        if n > valuation_lines {
            return Err(ImportError::TooFewValuationLines {
                expected: n,
                found: valuation_lines,
            });
        }
        if !restrictions.contains(&Restriction::Additive) {
            return Err(ImportError::MissingAdditiveRestriction);
        }
        if n == 0 && m > 0 {
            return Err(ImportError::NoAgents { items: m });
        }

        let mut agents = Agents::new();
        for (offset, line) in lines[2..][..n].iter().enumerate() {
            let line_number = offset + 3;
            let values = parse_integers(line, line_number)?;
            if values.len() != m {
                return Err(ImportError::WrongValuationCount {
                    line: line_number,
                    expected: m,
                    found: values.len(),
                });
            }
            agents.insert(Agent::with_values(AgentId::new(offset as u32 + 1), &values));
        }

        Ok(Self {
            agents,
            items: Items::range(1, m),
            restrictions,
        })
    }

    /// Read and parse an instance file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Render the text format. Items are written in ascending key order.
    pub fn to_text(&self) -> Result<String, ValuationError> {
        let tags: Vec<&str> = self.restrictions.iter().map(Restriction::tag).collect();
        let mut text = format!("{}\n{} {}\n", tags.join(" "), self.agents.len(), self.items.len());

        for agent in self.agents.iter() {
            let row = self
                .items
                .iter()
                .map(|item: ItemId| agent.value(item).map(|value| value.to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            text.push_str(&row.join(" "));
            text.push('\n');
        }
        Ok(text)
    }

    /// Check that every agent values every item.
    pub fn validate(&self) -> Result<(), ValuationError> {
        self.agents.ensure_valuations(&self.items)
    }
}

impl FromStr for Instance {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_integers(line: &str, line_number: usize) -> Result<Vec<Valuation>, ImportError> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<Valuation>().map_err(|_| ImportError::InvalidInteger {
                line: line_number,
                token: token.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "additive\n3 4\n8 6 4 2\n2 4 6 8\n5 5 5 5\n";

    #[test]
    fn test_parse_sample() {
        let instance = Instance::parse(SAMPLE).unwrap();
        assert_eq!(instance.agents.len(), 3);
        assert_eq!(instance.items.keys(), vec![1, 2, 3, 4]);
        assert_eq!(instance.restrictions, vec![Restriction::Additive]);

        let agent2 = instance.agents.get(&AgentId::new(2)).unwrap();
        assert_eq!(agent2.value(ItemId::new(4)).unwrap(), 8);
        instance.validate().unwrap();
    }

    #[test]
    fn test_export_reproduces_text() {
        let instance = Instance::parse(SAMPLE).unwrap();
        assert_eq!(instance.to_text().unwrap(), SAMPLE);
    }

    #[test]
    fn test_tolerates_blank_lines_and_unknown_tags() {
        let text = "\n  additive  monotone \n\n2 1\n 3 \n\n4\n";
        let instance = Instance::parse(text).unwrap();
        assert_eq!(instance.restrictions, vec![Restriction::Additive]);
        assert_eq!(instance.agents.len(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Instance::parse(""), Err(ImportError::MissingLine("restrictions"))));
        assert!(matches!(Instance::parse("additive\n"), Err(ImportError::MissingLine("header"))));
        assert!(matches!(Instance::parse("additive\n3\n"), Err(ImportError::InvalidHeader(_))));
        assert!(matches!(
            Instance::parse("additive\n2 x\n"),
            Err(ImportError::InvalidInteger { line: 2, .. })
        ));
        assert!(matches!(
            Instance::parse("additive\n2 2\n1 1\n"),
            Err(ImportError::TooFewValuationLines { expected: 2, found: 1 })
        ));
        assert!(matches!(
            Instance::parse("additive\n1 2\n1 1 1\n"),
            Err(ImportError::WrongValuationCount { line: 3, expected: 2, found: 3 })
        ));
        assert!(matches!(
            Instance::parse("additive\n1 1\n-4\n"),
            Err(ImportError::InvalidInteger { line: 3, .. })
        ));
        assert!(matches!(
            Instance::parse("unit\n1 1\n4\n"),
            Err(ImportError::MissingAdditiveRestriction)
        ));
    }

    #[test]
    fn test_oversized_agent_count_is_an_import_error() {
        let text = format!("additive\n{} 1\n5\n", u64::MAX);
        assert!(matches!(
            Instance::parse(&text),
            Err(ImportError::TooFewValuationLines { found: 1, .. })
        ));

        let text = format!("additive\n1 {}\n5\n", u64::MAX);
        assert!(matches!(
            Instance::parse(&text),
            Err(ImportError::WrongValuationCount { line: 3, found: 1, .. })
        ));
    }

    #[test]
    fn test_items_without_agents_are_rejected() {
        assert!(matches!(
            Instance::parse("additive\n0 3\n"),
            Err(ImportError::NoAgents { items: 3 })
        ));

        let empty = Instance::parse("additive\n0 0\n").unwrap();
        assert!(empty.agents.is_empty());
        assert!(empty.items.is_empty());
    }

    #[test]
    fn test_from_matrix() {
        let instance = Instance::from_matrix(&[vec![1, 2], vec![3, 4]]);
        assert_eq!(instance.items.len(), 2);
        assert_eq!(instance.to_text().unwrap(), "additive\n2 2\n1 2\n3 4\n");
    }
}
