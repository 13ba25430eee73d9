use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Weekly award budget for one admin, as reported by the backend for the
/// current ISO week. Re-fetched on every points-affecting check; caching
/// it across requests would open a double-spend window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAllowance {
    pub allowance: i64,
    pub used: i64,
    pub remaining: i64,
}

/// Business-rule refusals for an award attempt. These are values, not
/// faults: every variant renders as a friendly message and the dispatch
/// stack keeps running.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AwardDenied {
    #[error("self-award refused")]
    SelfAward,
    #[error("deductions are disabled")]
    DeductionDisabled,
    #[error("weekly allowance exhausted (quota {allowance})")]
    AllowanceExhausted { allowance: i64 },
    #[error("only {remaining} of {allowance} points left this week")]
    InsufficientAllowance { remaining: i64, allowance: i64 },
}

impl AwardDenied {
    pub fn user_message(&self) -> String {
        match self {
            Self::SelfAward => "Nice try! You can't award points to yourself. 😉".to_owned(),
            Self::DeductionDisabled => {
                "Point deductions are disabled. Only positive awards are allowed.".to_owned()
            }
            Self::AllowanceExhausted { allowance } => format!(
                "You've used your full weekly allowance ({allowance} pts). It resets on Monday."
            ),
            Self::InsufficientAllowance { remaining, allowance } => format!(
                "You only have {remaining} pts left this week (out of {allowance}). \
                 Try awarding {remaining} or less."
            ),
        }
    }
}

/// Pre-flight checks that don't need the allowance: direction and target.
pub fn check_award_shape(admin_id: &str, target_id: &str, points: i64) -> Result<(), AwardDenied> {
    if points < 0 {
        return Err(AwardDenied::DeductionDisabled);
    }
    if points > 0 && admin_id == target_id {
        return Err(AwardDenied::SelfAward);
    }
    Ok(())
}

impl AdminAllowance {
    /// Positive awards must fit inside what's left of the weekly budget.
    pub fn check(&self, points: i64) -> Result<(), AwardDenied> {
        if points <= 0 {
            return Ok(());
        }
        if self.remaining <= 0 {
            return Err(AwardDenied::AllowanceExhausted { allowance: self.allowance });
        }
        if points > self.remaining {
            return Err(AwardDenied::InsufficientAllowance {
                remaining: self.remaining,
                allowance: self.allowance,
            });
        }
        Ok(())
    }
}
