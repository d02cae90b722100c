use anchor_lang::prelude::*;

use crate::settlement::{CounterpartView, Settlement, Side};
use crate::{HookError, BPS_DENOMINATOR, MIN_EPOCH_LENGTH};

/// Per-mint game state, stored at `["game", mint]`.
///
/// The first eight fields are the persisted layout clients read; the rest
/// pin the pairing's own identity, its configuration and the PDA bump.
#[account]
#[derive(InitSpace, Default)]
pub struct Game {
    pub won: bool,
    pub consumed: bool,
    pub pending_payout: u64,
    pub next_epoch: u64,
    pub last_epoch: u64,
    pub last_price: u64,
    pub other_mint: Pubkey,
    pub oracle: Pubkey,

    pub mint: Pubkey,
    pub genesis_ts: i64,
    pub epoch_length: i64,
    pub threshold_bps: u16,
    pub bump: u8,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameStatus {
    Pending,
    Active,
    Won,
    Consumed,
}

/// Settlement parameters shared by both records of a pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairingConfig {
    pub epoch_length: i64,
    pub threshold_bps: u16,
}

impl PairingConfig {
    pub fn validate(&self) -> Result<()> {
        require!(self.epoch_length >= MIN_EPOCH_LENGTH, HookError::InvalidConfig);
        require!(
            self.threshold_bps > 0 && (self.threshold_bps as u128) < BPS_DENOMINATOR,
            HookError::InvalidConfig
        );
        Ok(())
    }
}

impl Game {
    /// Fill a freshly allocated record. Counters start at zero and
    /// `last_price` at the registration price.
    pub fn open(
        &mut self,
        mint: Pubkey,
        other_mint: Pubkey,
        oracle: Pubkey,
        price: u64,
        now: i64,
        config: PairingConfig,
        bump: u8,
    ) {
        self.won = false;
        self.consumed = false;
        self.pending_payout = 0;
        self.next_epoch = 0;
        self.last_epoch = 0;
        self.last_price = price;
        self.other_mint = other_mint;
        self.oracle = oracle;
        self.mint = mint;
        self.genesis_ts = now;
        self.epoch_length = config.epoch_length;
        self.threshold_bps = config.threshold_bps;
        self.bump = bump;
    }

    pub fn is_open(&self) -> bool {
        self.mint != Pubkey::default()
    }

    /// A record may only be opened once, and only alongside an empty
    /// extra-account-meta list.
    pub fn require_unregistered(&self, extra_metas_len: usize) -> Result<()> {
        require!(!self.is_open() && extra_metas_len == 0, HookError::AlreadyInitialized);
        Ok(())
    }

    pub fn status(&self) -> GameStatus {
        if self.consumed {
            GameStatus::Consumed
        } else if self.won {
            GameStatus::Won
        } else if self.next_epoch == 0 {
            GameStatus::Pending
        } else {
            GameStatus::Active
        }
    }

    pub fn side(&self) -> Side {
        Side::of(&self.mint, &self.other_mint)
    }

    pub fn current_epoch(&self, now: i64) -> u64 {
        let elapsed = now.saturating_sub(self.genesis_ts).max(0);
        (elapsed / self.epoch_length.max(1)) as u64
    }

    /// Both records point at each other and agree on oracle and configuration.
    pub fn is_paired_with(&self, other: &Game) -> bool {
        self.mint != other.mint
            && self.other_mint == other.mint
            && other.other_mint == self.mint
            && self.oracle == other.oracle
            && self.genesis_ts == other.genesis_ts
            && self.epoch_length == other.epoch_length
            && self.threshold_bps == other.threshold_bps
    }

    /// Everything the transfer hook does to this record, in order: refuse
    /// consumed mints, re-validate the pairing, read the pinned oracle, settle.
    ///
    /// `read_price` receives the pinned oracle address and must fail with
    /// `OracleMismatch` when the supplied pool is a different account.
    pub fn on_transfer<F>(&mut self, other: &Game, now: i64, read_price: F) -> Result<Settlement>
    where
        F: FnOnce(&Pubkey) -> Result<u64>,
    {
        require!(!self.consumed, HookError::MintConsumed);
        require!(self.is_paired_with(other), HookError::RecordMismatch);

        let price = read_price(&self.oracle)?;
        let epoch = self.current_epoch(now);
        Ok(self.settle(&CounterpartView::from(other), price, epoch))
    }

    /// Winner finalizes the loser. Returns the payout credited to the winner.
    pub fn consume(&mut self, loser: &mut Game) -> Result<u64> {
        require!(self.is_paired_with(loser), HookError::InvalidPairing);
        require!(self.won, HookError::NotYetWon);
        require!(!loser.consumed, HookError::AlreadyConsumed);
        require!(!loser.won, HookError::InvalidPairing);

        self.pending_payout = self
            .pending_payout
            .checked_add(loser.pending_payout)
            .ok_or(HookError::MathOverflow)?;
        loser.consumed = true;

        Ok(loser.pending_payout)
    }

    /// Validate a burn of `amount` out of `balance` and credit it in full.
    pub fn credit_burn(&mut self, amount: u64, balance: u64) -> Result<()> {
        require!(!self.consumed, HookError::MintConsumed);
        require!(amount > 0 && amount <= balance, HookError::InvalidAmount);

        self.pending_payout = self
            .pending_payout
            .checked_add(amount)
            .ok_or(HookError::MathOverflow)?;
        Ok(())
    }
}
