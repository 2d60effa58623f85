//! Pipeline stages and the numeric-id mapping used by the CRM

use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six fixed phases a deal passes through, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LeadIn = 1,
    LeadValidation = 2,
    SolutionDevelopment = 3,
    ProposalDevelopment = 4,
    Negotiation = 5,
    DealClosure = 6,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::LeadIn,
        Stage::LeadValidation,
        Stage::SolutionDevelopment,
        Stage::ProposalDevelopment,
        Stage::Negotiation,
        Stage::DealClosure,
    ];

    /// Maps a CRM `stage_id` to its stage
    pub fn from_id(id: i64) -> Option<Stage> {
        Stage::ALL.iter().copied().find(|stage| i64::from(stage.id()) == id)
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::LeadIn => "lead_in",
            Stage::LeadValidation => "lead_validation",
            Stage::SolutionDevelopment => "solution_development",
            Stage::ProposalDevelopment => "proposal_development",
            Stage::Negotiation => "negotiation",
            Stage::DealClosure => "deal_closure",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| FlowError::malformed(format!("unknown stage '{}'", s)))
    }
}

/// Stages strictly after `from_exclusive` up to and including `to_inclusive`, ascending
///
/// Used to synthesize one transition per stage a deal skipped over.
pub fn backfill_stages(from_exclusive: u8, to_inclusive: u8) -> Vec<Stage> {
    Stage::ALL
        .iter()
        .copied()
        .filter(|stage| stage.id() > from_exclusive && stage.id() <= to_inclusive)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_id_covers_pipeline() {
        assert_eq!(Stage::from_id(1), Some(Stage::LeadIn));
        assert_eq!(Stage::from_id(4), Some(Stage::ProposalDevelopment));
        assert_eq!(Stage::from_id(6), Some(Stage::DealClosure));
        assert_eq!(Stage::from_id(0), None);
        assert_eq!(Stage::from_id(7), None);
    }

    #[test]
    fn test_stage_names_round_trip_through_from_str() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        assert!("closing".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_ordering_follows_ids() {
        assert!(Stage::LeadIn < Stage::LeadValidation);
        assert!(Stage::Negotiation < Stage::DealClosure);
    }

    #[test]
    fn test_backfill_skipped_stages() {
        assert_eq!(
            backfill_stages(1, 3),
            vec![Stage::LeadValidation, Stage::SolutionDevelopment]
        );
        assert_eq!(backfill_stages(1, 1), Vec::<Stage>::new());
        assert_eq!(backfill_stages(4, 2), Vec::<Stage>::new());
        assert_eq!(backfill_stages(0, 6).len(), 6);
    }

    #[test]
    fn test_serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Stage::SolutionDevelopment).unwrap();
        assert_eq!(json, "\"solution_development\"");
    }
}
