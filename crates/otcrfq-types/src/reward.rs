//! Facilitator fee-share credits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParticipantId, Result, RewardId, RfqError, RfqId};

/// Share of a settled RFQ's taker fee owed to its facilitator.
///
/// The amount is fixed at settlement; claiming is one-way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitatorReward {
    pub id: RewardId,
    pub rfq_id: RfqId,
    pub facilitator: ParticipantId,
    pub asset: String,
    pub amount: u64,
    pub credited_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl FacilitatorReward {
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }

    /// # Errors
    /// Returns `RewardAlreadyClaimed` on a second claim.
    pub fn mark_claimed(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.is_claimed() {
            return Err(RfqError::RewardAlreadyClaimed(self.id));
        }
        self.claimed_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_one_way() {
        let mut reward = FacilitatorReward {
            id: RewardId::new(),
            rfq_id: RfqId::new(),
            facilitator: ParticipantId::new(),
            asset: "USDC".into(),
            amount: 20,
            credited_at: Utc::now(),
            claimed_at: None,
        };
        reward.mark_claimed(Utc::now()).unwrap();
        assert!(reward.is_claimed());
        let err = reward.mark_claimed(Utc::now()).unwrap_err();
        assert!(matches!(err, RfqError::RewardAlreadyClaimed(id) if id == reward.id));
    }
}
