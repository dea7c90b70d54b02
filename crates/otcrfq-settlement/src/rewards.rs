//! Facilitator reward book.
//!
//! The facilitator's share of a settled RFQ's fee is credited to the
//! facilitator's **frozen** balance; claiming moves it to available.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use otcrfq_escrow::BalanceManager;
use otcrfq_types::{FacilitatorReward, ParticipantId, Result, RewardId, RfqError, RfqId};

#[derive(Default)]
pub struct RewardBook {
    rewards: HashMap<RewardId, FacilitatorReward>,
    by_rfq: HashMap<RfqId, RewardId>,
}

impl RewardBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reward and freeze its amount in the facilitator's account.
    ///
    /// The amount must already have been taken out of the payer's balance.
    ///
    /// # Errors
    /// - `Internal` if the RFQ was already rewarded
    /// - `ArithmeticOverflow` if the facilitator balance would overflow
    pub fn credit(
        &mut self,
        balances: &mut BalanceManager,
        rfq_id: RfqId,
        facilitator: ParticipantId,
        asset: &str,
        amount: u64,
        at: DateTime<Utc>,
    ) -> Result<RewardId> {
        if self.by_rfq.contains_key(&rfq_id) {
            tracing::error!(rfq = %rfq_id, "facilitator reward credited twice");
            return Err(RfqError::Internal(format!(
                "reward for {rfq_id} already credited"
            )));
        }
        balances.credit_frozen(facilitator, asset, amount)?;

        let id = RewardId::new();
        self.rewards.insert(
            id,
            FacilitatorReward {
                id,
                rfq_id,
                facilitator,
                asset: asset.to_string(),
                amount,
                credited_at: at,
                claimed_at: None,
            },
        );
        self.by_rfq.insert(rfq_id, id);
        tracing::info!(reward = %id, rfq = %rfq_id, facilitator = %facilitator, amount, "facilitator reward credited");
        Ok(id)
    }

    /// Claim a reward: unfreeze its amount for the facilitator.
    ///
    /// # Errors
    /// - `RewardNotFound` for an unknown id
    /// - `Unauthorized` if `caller` is not the facilitator
    /// - `RewardAlreadyClaimed` on a second claim
    pub fn claim(
        &mut self,
        balances: &mut BalanceManager,
        reward_id: RewardId,
        caller: ParticipantId,
        at: DateTime<Utc>,
    ) -> Result<FacilitatorReward> {
        let reward = self
            .rewards
            .get_mut(&reward_id)
            .ok_or(RfqError::RewardNotFound(reward_id))?;
        if reward.facilitator != caller {
            return Err(RfqError::Unauthorized {
                participant: caller,
                action: "claim reward",
            });
        }
        if reward.is_claimed() {
            return Err(RfqError::RewardAlreadyClaimed(reward_id));
        }

        balances.unfreeze(caller, &reward.asset, reward.amount)?;
        reward.mark_claimed(at)?;
        tracing::info!(reward = %reward_id, facilitator = %caller, amount = reward.amount, "facilitator reward claimed");
        Ok(reward.clone())
    }

    #[must_use]
    pub fn get(&self, reward_id: RewardId) -> Option<&FacilitatorReward> {
        self.rewards.get(&reward_id)
    }

    #[must_use]
    pub fn for_rfq(&self, rfq_id: RfqId) -> Option<&FacilitatorReward> {
        self.by_rfq.get(&rfq_id).and_then(|id| self.rewards.get(id))
    }

    /// All rewards of one facilitator, oldest first.
    #[must_use]
    pub fn rewards_for(&self, facilitator: ParticipantId) -> Vec<FacilitatorReward> {
        let mut rewards: Vec<FacilitatorReward> = self
            .rewards
            .values()
            .filter(|r| r.facilitator == facilitator)
            .cloned()
            .collect();
        rewards.sort_by_key(|r| (r.credited_at, r.id));
        rewards
    }

    /// Sum of unclaimed reward amounts.
    #[must_use]
    pub fn outstanding(&self) -> u128 {
        self.rewards
            .values()
            .filter(|r| !r.is_claimed())
            .map(|r| u128::from(r.amount))
            .sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}
