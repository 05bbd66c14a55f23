//! Proportional payout arithmetic.

/// A winner's share of the pot: `floor(stake × pot / winning_total)`.
///
/// The multiplication runs in i128 so large pots cannot overflow. Flooring
/// loses at most one unit per winner, so for any resolution the payouts sum
/// to at most the pot and fall short of it by less than the number of
/// winners. Funds are never created.
pub fn proportional_payout(stake: i64, pot: i64, winning_total: i64) -> i64 {
    debug_assert!(winning_total > 0);
    ((stake as i128 * pot as i128) / winning_total as i128) as i64
}
