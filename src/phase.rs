//! The three agent phases a task moves through.
//!
//! Each phase is one agent invocation with a specific purpose:
//! - `Implement` writes the code for the task
//! - `Review` critiques the implementation (optional)
//! - `Finalize` applies review feedback, commits, and is the only phase that
//!   may mark a task completed

use serde::{Deserialize, Serialize};

/// One agent phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Implement,
    Review,
    Finalize,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 3] = [Phase::Implement, Phase::Review, Phase::Finalize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Implement => "implement",
            Phase::Review => "review",
            Phase::Finalize => "finalize",
        }
    }

    /// Name of the prompt template file for this phase.
    pub fn template_name(&self) -> String {
        format!("{}.md", self.as_str())
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "implement" => Ok(Phase::Implement),
            "review" => Ok(Phase::Review),
            "finalize" => Ok(Phase::Finalize),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: implement, review, finalize",
                s
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(
            Phase::ALL,
            [Phase::Implement, Phase::Review, Phase::Finalize]
        );
    }

    #[test]
    fn test_phase_from_str_case_insensitive() {
        assert_eq!("Review".parse::<Phase>().unwrap(), Phase::Review);
        assert_eq!("FINALIZE".parse::<Phase>().unwrap(), Phase::Finalize);
        let err = "deploy".parse::<Phase>().unwrap_err();
        assert!(err.to_string().contains("Invalid phase 'deploy'"));
    }

    #[test]
    fn test_phase_serde_lowercase() {
        let json = serde_json::to_string(&Phase::Implement).unwrap();
        assert_eq!(json, "\"implement\"");
        let parsed: Phase = serde_json::from_str("\"finalize\"").unwrap();
        assert_eq!(parsed, Phase::Finalize);
    }

    #[test]
    fn test_template_name() {
        assert_eq!(Phase::Review.template_name(), "review.md");
    }
}
