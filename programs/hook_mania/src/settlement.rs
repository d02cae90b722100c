//! Epoch settlement.
//!
//! Each record settles on its own transfers only and reads the counterpart.
//! Movement is judged against the record's `last_price`, the last price it
//! observed. The mint with the greater identity is the `Up` side and wins on
//! a qualifying rise; the other mint wins on a qualifying fall. When both
//! sides qualify in the same epoch, from their own last prices and at the
//! same observed price, the greater identity takes it no matter which mint
//! moves first.

use anchor_lang::prelude::*;

use crate::{Game, BPS_DENOMINATOR};

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Movement {
    Up,
    Down,
    Flat,
}

impl Movement {
    /// Classify `observed` against `baseline` with a symmetric band of
    /// `threshold_bps`. A zero baseline has no relative movement.
    pub fn between(baseline: u64, observed: u64, threshold_bps: u16) -> Self {
        if baseline == 0 {
            return Movement::Flat;
        }
        let baseline = baseline as u128;
        let observed = observed as u128 * BPS_DENOMINATOR;
        let band = threshold_bps as u128;

        if observed >= baseline * (BPS_DENOMINATOR + band) {
            Movement::Up
        } else if observed <= baseline * BPS_DENOMINATOR.saturating_sub(band) {
            Movement::Down
        } else {
            Movement::Flat
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Up,
    Down,
}

impl Side {
    pub fn of(mint: &Pubkey, other_mint: &Pubkey) -> Self {
        if mint > other_mint {
            Side::Up
        } else {
            Side::Down
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Up => Side::Down,
            Side::Down => Side::Up,
        }
    }

    pub fn wins_on(self, movement: Movement) -> bool {
        matches!(
            (self, movement),
            (Side::Up, Movement::Up) | (Side::Down, Movement::Down)
        )
    }
}

/// What settlement is allowed to see of the other record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterpartView {
    pub won: bool,
    pub last_epoch: u64,
    pub last_price: u64,
}

impl From<&Game> for CounterpartView {
    fn from(game: &Game) -> Self {
        Self {
            won: game.won,
            last_epoch: game.last_epoch,
            last_price: game.last_price,
        }
    }
}

impl CounterpartView {
    /// Would the counterpart, still due to settle at `epoch`, also win at
    /// `observed`?
    fn contends(&self, side: Side, observed: u64, epoch: u64, threshold_bps: u16) -> bool {
        self.last_epoch < epoch
            && side.wins_on(Movement::between(self.last_price, observed, threshold_bps))
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// This record just became the winner.
    Won,
    /// Qualified, but the counterpart qualifies too and holds the tie-break.
    Yielded,
    NoWinner,
    /// One side already won; `won` is frozen.
    AlreadyDecided,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// No epoch boundary passed; only `last_price` moved.
    Refreshed,
    Settled { movement: Movement, decision: Decision },
}

impl Game {
    /// A boundary has passed once `current_epoch` is beyond `last_epoch`.
    /// Crossing it shifts the counters (`last_epoch` takes the old
    /// `next_epoch`, `next_epoch` takes `current_epoch`) and judges
    /// `observed_price` against `last_price`. An epoch behind `next_epoch`
    /// (clock regression) only refreshes the price.
    pub fn settle(
        &mut self,
        counterpart: &CounterpartView,
        observed_price: u64,
        current_epoch: u64,
    ) -> Settlement {
        if current_epoch <= self.last_epoch || current_epoch < self.next_epoch {
            self.last_price = observed_price;
            return Settlement::Refreshed;
        }

        let movement = Movement::between(self.last_price, observed_price, self.threshold_bps);
        self.last_epoch = self.next_epoch;
        self.next_epoch = current_epoch;
        self.last_price = observed_price;

        let side = self.side();
        let decision = if self.won || counterpart.won {
            Decision::AlreadyDecided
        } else if !side.wins_on(movement) {
            Decision::NoWinner
        } else if side == Side::Down
            && counterpart.contends(side.opposite(), observed_price, current_epoch, self.threshold_bps)
        {
            Decision::Yielded
        } else {
            self.won = true;
            Decision::Won
        };

        Settlement::Settled { movement, decision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PairingConfig;

    const CONFIG: PairingConfig = PairingConfig { epoch_length: 3_600, threshold_bps: 1_000 };

    fn game(mint: Pubkey, other_mint: Pubkey, price: u64) -> Game {
        let mut game = Game::default();
        game.open(mint, other_mint, Pubkey::new_unique(), price, 0, CONFIG, 255);
        game
    }

    /// (greater identity, lesser identity)
    fn ordered_mints() -> (Pubkey, Pubkey) {
        let (x, y) = (Pubkey::new_unique(), Pubkey::new_unique());
        (x.max(y), x.min(y))
    }

    #[test]
    fn movement_respects_threshold_band() {
        assert_eq!(Movement::between(100, 110, 1_000), Movement::Up);
        assert_eq!(Movement::between(100, 109, 1_000), Movement::Flat);
        assert_eq!(Movement::between(100, 90, 1_000), Movement::Down);
        assert_eq!(Movement::between(100, 91, 1_000), Movement::Flat);
        assert_eq!(Movement::between(0, 1_000, 1_000), Movement::Flat);
        assert_eq!(Movement::between(u64::MAX, u64::MAX, 1), Movement::Flat);
    }

    #[test]
    fn greater_identity_rides_the_price_up() {
        let (hi, lo) = ordered_mints();
        assert_eq!(Side::of(&hi, &lo), Side::Up);
        assert_eq!(Side::of(&lo, &hi), Side::Down);
        assert!(Side::Up.wins_on(Movement::Up));
        assert!(!Side::Up.wins_on(Movement::Down));
        assert!(Side::Down.wins_on(Movement::Down));
        assert!(!Side::Down.wins_on(Movement::Flat));
    }

    #[test]
    fn same_epoch_only_refreshes_price() {
        let (hi, lo) = ordered_mints();
        let mut up = game(hi, lo, 100);
        let view = CounterpartView::from(&game(lo, hi, 100));

        assert_eq!(up.settle(&view, 500, 0), Settlement::Refreshed);
        assert_eq!(up.last_price, 500);
        assert_eq!((up.last_epoch, up.next_epoch), (0, 0));
        assert!(!up.won);
    }

    #[test]
    fn epoch_boundary_shifts_counters() {
        let (hi, lo) = ordered_mints();
        let mut up = game(hi, lo, 100);
        let view = CounterpartView::from(&game(lo, hi, 100));

        let outcome = up.settle(&view, 101, 3);
        assert_eq!(
            outcome,
            Settlement::Settled { movement: Movement::Flat, decision: Decision::NoWinner }
        );
        assert_eq!((up.last_epoch, up.next_epoch), (0, 3));
        assert_eq!(up.last_price, 101);

        // 3 is still beyond last_epoch, so the counters shift once more
        assert!(matches!(up.settle(&view, 102, 3), Settlement::Settled { .. }));
        assert_eq!((up.last_epoch, up.next_epoch), (3, 3));

        assert_eq!(up.settle(&view, 103, 3), Settlement::Refreshed);
        assert_eq!((up.last_epoch, up.next_epoch), (3, 3));

        up.settle(&view, 104, 5);
        assert_eq!((up.last_epoch, up.next_epoch), (3, 5));
        assert!(up.next_epoch >= up.last_epoch);
    }

    #[test]
    fn movement_is_judged_against_last_observed_price() {
        let (hi, lo) = ordered_mints();
        let mut up = game(hi, lo, 100);
        let view = CounterpartView::from(&game(lo, hi, 100));

        assert_eq!(up.settle(&view, 140, 0), Settlement::Refreshed);
        // +7.1% from 140, not +50% from the registration price
        assert_eq!(
            up.settle(&view, 150, 1),
            Settlement::Settled { movement: Movement::Flat, decision: Decision::NoWinner }
        );
        assert!(!up.won);
    }

    #[test]
    fn won_is_frozen_once_decided() {
        let (hi, lo) = ordered_mints();
        let mut up = game(hi, lo, 100);
        let view = CounterpartView::from(&game(lo, hi, 100));

        up.settle(&view, 150, 1);
        assert!(up.won);

        let outcome = up.settle(&view, 10, 2);
        assert_eq!(
            outcome,
            Settlement::Settled { movement: Movement::Down, decision: Decision::AlreadyDecided }
        );
        assert!(up.won);
        assert_eq!(up.last_price, 10);
    }

    #[test]
    fn counterpart_win_blocks_this_side() {
        let (hi, lo) = ordered_mints();
        let mut down = game(lo, hi, 100);
        let mut winner = game(hi, lo, 100);
        winner.won = true;

        let outcome = down.settle(&CounterpartView::from(&winner), 50, 1);
        assert_eq!(
            outcome,
            Settlement::Settled { movement: Movement::Down, decision: Decision::AlreadyDecided }
        );
        assert!(!down.won);
    }

    /// Lesser identity observes 200 inside epoch 0, so in epoch 1 a price of
    /// 150 is a fall for it and a rise for the untouched greater identity.
    fn contested_pair() -> (Game, Game) {
        let (hi, lo) = ordered_mints();
        let up = game(hi, lo, 100);
        let mut down = game(lo, hi, 100);
        let view = CounterpartView::from(&up);
        assert_eq!(down.settle(&view, 200, 0), Settlement::Refreshed);
        (up, down)
    }

    #[test]
    fn contested_epoch_goes_to_greater_identity_in_either_order() {
        let (mut up, mut down) = contested_pair();
        up.settle(&CounterpartView::from(&down), 150, 1);
        down.settle(&CounterpartView::from(&up), 150, 1);
        let up_first = (up.won, down.won);

        let (mut up, mut down) = contested_pair();
        let outcome = down.settle(&CounterpartView::from(&up), 150, 1);
        assert_eq!(
            outcome,
            Settlement::Settled { movement: Movement::Down, decision: Decision::Yielded }
        );
        up.settle(&CounterpartView::from(&down), 150, 1);
        let down_first = (up.won, down.won);

        assert_eq!(up_first, (true, false));
        assert_eq!(down_first, up_first);
    }

    #[test]
    fn uncontested_fall_goes_to_lesser_identity() {
        let (hi, lo) = ordered_mints();
        let mut up = game(hi, lo, 100);
        let mut down = game(lo, hi, 100);

        down.settle(&CounterpartView::from(&up), 80, 1);
        up.settle(&CounterpartView::from(&down), 80, 1);

        assert!(down.won);
        assert!(!up.won);
    }
}
