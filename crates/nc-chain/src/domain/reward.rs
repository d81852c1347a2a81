//! Block reward schedule.

use crate::domain::config::ChainConfig;

/// Piecewise-constant reward by height.
///
/// No reward before `offset`; afterwards the milestone at
/// `floor((height - offset) / distance)`, clamped to the last milestone.
#[derive(Debug, Clone)]
pub struct RewardSchedule {
    offset: u32,
    distance: u32,
    milestones: Vec<u64>,
}

impl RewardSchedule {
    pub fn new(offset: u32, distance: u32, milestones: Vec<u64>) -> Self {
        Self {
            offset,
            // a zero distance would divide by zero; treat it as one block
            distance: distance.max(1),
            milestones,
        }
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(
            config.reward_offset,
            config.reward_distance,
            config.reward_milestones.clone(),
        )
    }

    /// Index into the milestone list for `height`.
    pub fn calculate_milestone(&self, height: u32) -> usize {
        let location = (height.saturating_sub(self.offset) / self.distance) as usize;
        location.min(self.milestones.len().saturating_sub(1))
    }

    pub fn calculate_default_reward(&self, height: u32) -> u64 {
        if height < self.offset || self.milestones.is_empty() {
            return 0;
        }
        self.milestones[self.calculate_milestone(height)]
    }
}
