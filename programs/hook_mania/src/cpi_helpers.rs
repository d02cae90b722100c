//! PDA and extra-account helpers for Hook Mania
//!
//! Clients use these to locate a pairing's accounts and to see which extra
//! accounts Token-2022 will append to every transfer of a paired mint.
//!
//! # Example
//!
//! ```ignore
//! use hook_mania::cpi_helpers::{derive_game_pda, derive_extra_account_metas_pda};
//!
//! let (game, _) = derive_game_pda(&mint, &hook_mania::ID);
//! let (other_game, _) = derive_game_pda(&other_mint, &hook_mania::ID);
//! let (metas, _) = derive_extra_account_metas_pda(&mint, &hook_mania::ID);
//! ```

use anchor_lang::prelude::*;
use spl_tlv_account_resolution::account::ExtraAccountMeta;

use crate::{EXTRA_ACCOUNT_METAS_SEED, GAME_SEED};

/// Derive the game record PDA of a mint
pub fn derive_game_pda(mint: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[GAME_SEED, mint.as_ref()], program_id)
}

/// Derive the extra-account-meta list PDA of a mint
pub fn derive_extra_account_metas_pda(mint: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[EXTRA_ACCOUNT_METAS_SEED, mint.as_ref()], program_id)
}

/// Ordered extras appended to every transfer of a mint, after source, mint,
/// destination, owner and the list itself: the paired mint, this mint's game
/// (writable), the paired game and the pinned oracle.
pub fn hook_account_metas(
    other_mint: &Pubkey,
    game: &Pubkey,
    other_game: &Pubkey,
    oracle: &Pubkey,
) -> Result<Vec<ExtraAccountMeta>> {
    Ok(vec![
        ExtraAccountMeta::new_with_pubkey(other_mint, false, false)?,
        ExtraAccountMeta::new_with_pubkey(game, false, true)?,
        ExtraAccountMeta::new_with_pubkey(other_game, false, false)?,
        ExtraAccountMeta::new_with_pubkey(oracle, false, false)?,
    ])
}
