//! Property tests for pot conservation.
//!
//! For any resolution the payouts may never exceed the pot, flooring may
//! leave behind less than one unit per winner, and a winner always recovers
//! at least their stake.

use bookie::group::proportional_payout;
use proptest::prelude::*;

proptest! {
    #[test]
    fn payouts_never_exceed_the_pot(
        winner_stakes in prop::collection::vec(1i64..=1_000_000, 1..20),
        loser_total in 0i64..=10_000_000,
    ) {
        let winning_total: i64 = winner_stakes.iter().sum();
        let pot = winning_total + loser_total;

        let paid: i64 = winner_stakes
            .iter()
            .map(|&stake| proportional_payout(stake, pot, winning_total))
            .sum();

        prop_assert!(paid <= pot);
    }

    #[test]
    fn flooring_loses_less_than_one_unit_per_winner(
        winner_stakes in prop::collection::vec(1i64..=1_000_000, 1..20),
        loser_total in 0i64..=10_000_000,
    ) {
        let winning_total: i64 = winner_stakes.iter().sum();
        let pot = winning_total + loser_total;

        let paid: i64 = winner_stakes
            .iter()
            .map(|&stake| proportional_payout(stake, pot, winning_total))
            .sum();

        prop_assert!(pot - paid < winner_stakes.len() as i64);
    }

    #[test]
    fn winners_recover_at_least_their_stake(
        winner_stakes in prop::collection::vec(1i64..=1_000_000, 1..20),
        loser_total in 0i64..=10_000_000,
    ) {
        let winning_total: i64 = winner_stakes.iter().sum();
        let pot = winning_total + loser_total;

        for &stake in &winner_stakes {
            prop_assert!(proportional_payout(stake, pot, winning_total) >= stake);
        }
    }

    #[test]
    fn sole_winner_takes_the_whole_pot(
        stake in 1i64..=1_000_000,
        loser_total in 0i64..=10_000_000,
    ) {
        prop_assert_eq!(
            proportional_payout(stake, stake + loser_total, stake),
            stake + loser_total
        );
    }
}
