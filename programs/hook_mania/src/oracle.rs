//! Raydium CLMM price adapter.
//!
//! The pairing pins one pool account at registration. Every read re-validates
//! the supplied account against that pin and derives the price from the pool's
//! own bytes; no price is ever taken from instruction data.

use anchor_lang::prelude::*;
use fixed::types::{I80F48, U64F64};

use crate::HookError;

/// Raydium CLMM program on mainnet.
pub const RAYDIUM_CLMM_PROGRAM_ID_MAINNET: Pubkey =
    pubkey!("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK");

/// Raydium CLMM program on devnet.
pub const RAYDIUM_CLMM_PROGRAM_ID_DEVNET: Pubkey =
    pubkey!("DRayAUgENGQBKVaX8owNhgzkEDyoHTGVEGHVJT1E9pfH");

#[cfg(not(feature = "devnet"))]
pub const RAYDIUM_CLMM_PROGRAM_ID: Pubkey = RAYDIUM_CLMM_PROGRAM_ID_MAINNET;
#[cfg(feature = "devnet")]
pub const RAYDIUM_CLMM_PROGRAM_ID: Pubkey = RAYDIUM_CLMM_PROGRAM_ID_DEVNET;

pub const USDC_MINT: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
pub const WSOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

/// Size of a Raydium `PoolState` account, discriminator included.
pub const POOL_STATE_LEN: usize = 1544;
pub const POOL_STATE_DISCRIMINATOR: [u8; 8] = [247, 237, 227, 245, 215, 195, 222, 70];

const TOKEN_MINT_0_OFFSET: usize = 73;
const TOKEN_MINT_1_OFFSET: usize = 105;
const SQRT_PRICE_X64_OFFSET: usize = 253;

/// Fixed-point scale of every price returned by the adapter (6 decimals).
pub const PRICE_SCALE: i128 = 1_000_000;

/// The slice of Raydium's pool state the game cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClmmPool {
    /// sqrt(price) as Q64.64
    pub sqrt_price_x64: u128,
    pub token_mint_0: Pubkey,
    pub token_mint_1: Pubkey,
}

impl ClmmPool {
    pub fn parse(owner: &Pubkey, data: &[u8]) -> Result<Self> {
        require_keys_eq!(*owner, RAYDIUM_CLMM_PROGRAM_ID, HookError::InvalidOracle);
        require!(data.len() == POOL_STATE_LEN, HookError::InvalidOracle);
        require!(data[..8] == POOL_STATE_DISCRIMINATOR, HookError::InvalidOracle);

        Ok(Self {
            sqrt_price_x64: u128::from_le_bytes(read_array(data, SQRT_PRICE_X64_OFFSET)?),
            token_mint_0: Pubkey::new_from_array(read_array(data, TOKEN_MINT_0_OFFSET)?),
            token_mint_1: Pubkey::new_from_array(read_array(data, TOKEN_MINT_1_OFFSET)?),
        })
    }

    pub fn load(pool: &AccountInfo) -> Result<Self> {
        let data = pool.try_borrow_data()?;
        Self::parse(pool.owner, &data)
    }

    /// Pools quoted against USDC (or SOL) as token 0 are flipped so the price
    /// always reads as "quote per base".
    pub fn is_inverted(&self) -> bool {
        self.token_mint_0 == USDC_MINT
            || (self.token_mint_0 == WSOL_MINT && self.token_mint_1 != USDC_MINT)
    }

    /// Quote per base as a fixed-point number.
    pub fn quote_price(&self) -> Result<I80F48> {
        let sqrt_price = U64F64::from_bits(self.sqrt_price_x64);
        let price = sqrt_price
            .checked_mul(sqrt_price)
            .and_then(I80F48::checked_from_num)
            .ok_or(HookError::MathOverflow)?;

        if !self.is_inverted() {
            return Ok(price);
        }
        require!(price > I80F48::ZERO, HookError::InvalidOracle);
        I80F48::ONE
            .checked_div(price)
            .ok_or_else(|| error!(HookError::MathOverflow))
    }

    /// Pool price scaled by [`PRICE_SCALE`]. A pool too cheap to show up at
    /// that scale has no usable price.
    pub fn price(&self) -> Result<u64> {
        let scaled = self
            .quote_price()?
            .checked_mul_int(PRICE_SCALE)
            .and_then(|scaled| scaled.checked_to_num::<u64>())
            .ok_or(HookError::MathOverflow)?;
        require!(scaled > 0, HookError::InvalidOracle);
        Ok(scaled)
    }
}

pub fn verify_pinned(supplied: &Pubkey, pinned: &Pubkey) -> Result<()> {
    require_keys_eq!(*supplied, *pinned, HookError::OracleMismatch);
    Ok(())
}

/// Read the current price of `pool`, which must be the pinned oracle.
pub fn read_price(pool: &AccountInfo, pinned: &Pubkey) -> Result<u64> {
    verify_pinned(pool.key, pinned)?;
    ClmmPool::load(pool)?.price()
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or_else(|| error!(HookError::InvalidOracle))
}
