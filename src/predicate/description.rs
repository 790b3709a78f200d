//! Textual description of predicate chains.
//!
//! Descriptions mirror the fallback structure of a rule and only exist for
//! logs and diagnostics. Rendering:
//! - a leaf renders its text
//! - an AND group renders `(a && b)`
//! - a fallback chain renders `a -> b -> c`

use std::fmt;

pub const AVAILABILITY: &str = "availability";
pub const ZONE_AVOIDANCE: &str = "zone avoidance";
pub const ANY: &str = "any";

/// Composable description tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleDescription {
    Leaf(String),
    And(Vec<RuleDescription>),
    Fallback(Vec<RuleDescription>),
}

impl RuleDescription {
    /// Require `other` in addition to this description.
    pub fn and(self, other: RuleDescription) -> Self {
        match self {
            RuleDescription::And(mut members) => {
                members.push(other);
                RuleDescription::And(members)
            }
            first => RuleDescription::And(vec![first, other]),
        }
    }

    /// Fall back to `other` when this description's tier is not satisfied.
    pub fn fallback(self, other: RuleDescription) -> Self {
        match self {
            RuleDescription::Fallback(mut tiers) => {
                tiers.push(other);
                RuleDescription::Fallback(tiers)
            }
            first => RuleDescription::Fallback(vec![first, other]),
        }
    }

    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl From<&str> for RuleDescription {
    fn from(text: &str) -> Self {
        RuleDescription::Leaf(text.to_string())
    }
}

impl From<String> for RuleDescription {
    fn from(text: String) -> Self {
        RuleDescription::Leaf(text)
    }
}

impl fmt::Display for RuleDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleDescription::Leaf(text) => f.write_str(text),
            RuleDescription::And(members) => {
                f.write_str("(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" && ")?;
                    }
                    match member {
                        RuleDescription::Fallback(_) => write!(f, "({})", member)?,
                        _ => write!(f, "{}", member)?,
                    }
                }
                f.write_str(")")
            }
            RuleDescription::Fallback(tiers) => {
                for (i, tier) in tiers.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" -> ")?;
                    }
                    write!(f, "{}", tier)?;
                }
                Ok(())
            }
        }
    }
}
