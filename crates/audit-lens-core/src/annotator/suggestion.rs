use serde::{Deserialize, Serialize};

/// Canned remediation hints attached to report lines by keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixSuggestion {
    ReentrancyGuard,
    RenameShadowedVariable,
    CheckedArithmetic,
}

/// Lookup order. The first suggestion whose keyword is contained in a line wins.
const SUGGESTION_ORDER: [FixSuggestion; 3] = [
    FixSuggestion::ReentrancyGuard,
    FixSuggestion::RenameShadowedVariable,
    FixSuggestion::CheckedArithmetic,
];

impl FixSuggestion {
    /// Select the suggestion for a single report line, if any keyword matches.
    pub fn for_line(line: &str) -> Option<Self> {
        SUGGESTION_ORDER
            .into_iter()
            .find(|suggestion| line.contains(suggestion.keyword()))
    }

    /// Case-sensitive substring that selects this suggestion.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::ReentrancyGuard => "Reentrancy",
            Self::RenameShadowedVariable => "shadowing",
            Self::CheckedArithmetic => "overflow",
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::ReentrancyGuard => {
                "Suggestion: Use a reentrancy guard (e.g. OpenZeppelin's ReentrancyGuard)."
            }
            Self::RenameShadowedVariable => {
                "Suggestion: Rename your variable to avoid name conflict."
            }
            Self::CheckedArithmetic => "Suggestion: Use SafeMath or built-in overflow checks.",
        }
    }
}
