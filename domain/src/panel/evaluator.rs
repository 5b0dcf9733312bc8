//! The fixed evaluator panel
//!
//! Conclave scores every proposal with the same five evaluators. The roster
//! and its order are a compatibility surface: persisted step names and step
//! order indices are derived from it.

use serde::{Deserialize, Serialize};

/// One of the five fixed evaluator roles on the panel
///
/// # Example
///
/// ```
/// use conclave_domain::panel::Evaluator;
///
/// let roster = Evaluator::roster();
/// assert_eq!(roster.len(), 5);
/// assert_eq!(roster[1], Evaluator::Security);
/// assert!(Evaluator::Security.is_security());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Evaluator {
    /// System design and integration fit
    Architecture,
    /// Attack surface and data handling; holds the veto
    Security,
    /// Latency, throughput, and resource cost
    Performance,
    /// Scope, effort, and delivery risk
    Feasibility,
    /// Maintainability and correctness of the proposed work
    Quality,
}

impl Evaluator {
    /// The full panel in canonical order
    ///
    /// This order determines review step ordering and the sequence of
    /// evaluation service calls.
    pub fn roster() -> [Evaluator; 5] {
        [
            Evaluator::Architecture,
            Evaluator::Security,
            Evaluator::Performance,
            Evaluator::Feasibility,
            Evaluator::Quality,
        ]
    }

    /// Stable identifier used in persistence and step names
    pub fn as_str(&self) -> &'static str {
        match self {
            Evaluator::Architecture => "architecture",
            Evaluator::Security => "security",
            Evaluator::Performance => "performance",
            Evaluator::Feasibility => "feasibility",
            Evaluator::Quality => "quality",
        }
    }

    /// Whether this evaluator is the designated security evaluator
    pub fn is_security(&self) -> bool {
        matches!(self, Evaluator::Security)
    }

    /// Position in the canonical roster (0-indexed)
    pub fn roster_index(&self) -> usize {
        Self::roster()
            .iter()
            .position(|e| e == self)
            .expect("roster contains every variant")
    }
}

impl std::fmt::Display for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Evaluator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "architecture" => Ok(Evaluator::Architecture),
            "security" => Ok(Evaluator::Security),
            "performance" => Ok(Evaluator::Performance),
            "feasibility" => Ok(Evaluator::Feasibility),
            "quality" => Ok(Evaluator::Quality),
            _ => Err(format!("Unknown evaluator: {}", s)),
        }
    }
}
