//! Checks on raw Token-2022 account data and signer authority.

use anchor_lang::prelude::*;
use anchor_lang::solana_program::program_option::COption;
use anchor_spl::token_2022::spl_token_2022::{
    extension::{
        transfer_hook::{TransferHook, TransferHookAccount},
        BaseStateWithExtensions, StateWithExtensions,
    },
    state::{Account, Mint},
};

use crate::HookError;

/// The mint's transfer-hook extension must name `program_id`, otherwise its
/// transfers would never settle.
pub fn require_hook_installed(mint_data: &[u8], program_id: &Pubkey) -> Result<()> {
    let state = StateWithExtensions::<Mint>::unpack(mint_data)?;
    let hook = state
        .get_extension::<TransferHook>()
        .map_err(|_| error!(HookError::HookNotInstalled))?;
    require!(
        Option::<Pubkey>::from(hook.program_id) == Some(*program_id),
        HookError::HookNotInstalled
    );
    Ok(())
}

/// Token-2022 raises `transferring` on the source account only for the
/// duration of a real transfer; direct calls to the hook see it cleared.
pub fn require_transferring(source_data: &[u8]) -> Result<()> {
    let account = StateWithExtensions::<Account>::unpack(source_data)?;
    let hook = account
        .get_extension::<TransferHookAccount>()
        .map_err(|_| error!(HookError::NotTransferring))?;
    require!(bool::from(hook.transferring), HookError::NotTransferring);
    Ok(())
}

pub fn require_mint_authority(mint_authority: &COption<Pubkey>, signer: &Pubkey) -> Result<()> {
    require!(*mint_authority == COption::Some(*signer), HookError::Unauthorized);
    Ok(())
}

pub fn require_token_owner(token_owner: &Pubkey, signer: &Pubkey) -> Result<()> {
    require_keys_eq!(*token_owner, *signer, HookError::Unauthorized);
    Ok(())
}
