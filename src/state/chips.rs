//! Suggested stake denominations.

use serde::Serialize;

/// Chip values offered to the player plus the all-in ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChipSet {
    /// Ascending, deduplicated, all within `[min_bet, all_in]`.
    pub chips: Vec<u64>,
    pub all_in: u64,
}

impl ChipSet {
    pub fn contains(&self, amount: u64) -> bool {
        self.chips.contains(&amount)
    }
}

/// Derive chip denominations from table limits and a balance.
///
/// The first three chips are 1x, 2x and 3x the minimum bet. When the
/// ceiling leaves room above 3x, two more chips are placed at the 1/3 and
/// 2/3 points of `[3 * min_bet, ceiling]` and rounded to a step that grows
/// with their magnitude.
pub fn compute_chip_set(min_bet: u64, max_bet: u64, balance: u64) -> ChipSet {
    let ceiling = max_bet.min(balance);
    let floor = min_bet.max(1);
    let base = [min_bet, min_bet.saturating_mul(2), min_bet.saturating_mul(3)];
    let top_of_base = base[2];

    let mut chips: Vec<u64> = base.to_vec();

    if ceiling > top_of_base {
        let span = ceiling - top_of_base;
        for fraction in [1, 2] {
            let point = top_of_base + span * fraction / 3;
            chips.push(round_to_denomination(point));
        }
    }

    chips.retain(|c| *c >= floor && *c <= ceiling);
    chips.sort_unstable();
    chips.dedup();

    ChipSet {
        chips,
        all_in: ceiling,
    }
}

/// Round to half of the value's order of magnitude.
///
/// 353_333 rounds on a 50_000 step to 350_000; 6_766 on a 500 step to 7_000.
/// Single-digit values are returned unchanged.
pub fn round_to_denomination(value: u64) -> u64 {
    if value < 10 {
        return value;
    }
    let magnitude = 10u64.pow(value.ilog10());
    let step = magnitude / 2;
    value.saturating_add(step / 2) / step * step
}
