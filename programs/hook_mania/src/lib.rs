use anchor_lang::prelude::*;
use anchor_lang::solana_program::program::invoke_signed;
use anchor_lang::system_program::{
    allocate, assign, create_account, transfer, Allocate, Assign, CreateAccount, Transfer,
};
use anchor_spl::token_2022::spl_token_2022::{self, instruction::AuthorityType};
use anchor_spl::token_2022::{self, Burn, SetAuthority, Token2022};
use anchor_spl::token_interface::{Mint, TokenAccount};
use spl_tlv_account_resolution::{account::ExtraAccountMeta, state::ExtraAccountMetaList};
use spl_transfer_hook_interface::instruction::{ExecuteInstruction, TransferHookInstruction};

pub mod cpi_helpers;
pub mod game;
pub mod guards;
pub mod oracle;
pub mod settlement;


pub use game::*;
pub use settlement::{CounterpartView, Decision, Movement, Settlement, Side};

use cpi_helpers::hook_account_metas;
use oracle::ClmmPool;

declare_id!("HVdrSmooRTfhWnhWnvWu5emxxnuNdqXmZzZ4jCt8CyWv");

pub const GAME_SEED: &[u8] = b"game";
pub const EXTRA_ACCOUNT_METAS_SEED: &[u8] = b"extra-account-metas";
pub const BPS_DENOMINATOR: u128 = 10_000;
/// Shortest epoch a pairing may be registered with, in seconds
pub const MIN_EPOCH_LENGTH: i64 = 60;

/// Hook Mania
/// Two Token-2022 mints bet against each other on a Raydium CLMM price.
/// Every transfer of either mint settles that mint's side of the duel.

#[program]
pub mod hook_mania {
    use super::*;

    /// Pair two mints around one oracle pool.
    /// Creates both game records and both extra-account-meta lists, then hands
    /// each mint's mint authority to the other side's game record.
    pub fn register(ctx: Context<Register>, epoch_length: i64, threshold_bps: u16) -> Result<()> {
        let config = PairingConfig { epoch_length, threshold_bps };
        config.validate()?;

        let authority = ctx.accounts.authority.key();
        guards::require_mint_authority(&ctx.accounts.mint_a.mint_authority, &authority)?;
        guards::require_mint_authority(&ctx.accounts.mint_b.mint_authority, &authority)?;

        ctx.accounts.game_a.require_unregistered(ctx.accounts.extra_metas_a.data_len())?;
        ctx.accounts.game_b.require_unregistered(ctx.accounts.extra_metas_b.data_len())?;

        for mint in [&ctx.accounts.mint_a, &ctx.accounts.mint_b] {
            let mint_info = mint.to_account_info();
            let data = mint_info.try_borrow_data()?;
            guards::require_hook_installed(&data, &crate::ID)?;
        }

        let price = ClmmPool::load(&ctx.accounts.oracle)?.price()?;
        let now = Clock::get()?.unix_timestamp;

        let mint_a = ctx.accounts.mint_a.key();
        let mint_b = ctx.accounts.mint_b.key();
        let oracle = ctx.accounts.oracle.key();
        let game_a = ctx.accounts.game_a.key();
        let game_b = ctx.accounts.game_b.key();

        ctx.accounts.game_a.open(mint_a, mint_b, oracle, price, now, config, ctx.bumps.game_a);
        ctx.accounts.game_b.open(mint_b, mint_a, oracle, price, now, config, ctx.bumps.game_b);

        let accounts = &ctx.accounts;
        create_extra_account_meta_list(
            &accounts.authority,
            &accounts.extra_metas_a,
            &accounts.system_program,
            &mint_a,
            ctx.bumps.extra_metas_a,
            &hook_account_metas(&mint_b, &game_a, &game_b, &oracle)?,
        )?;
        create_extra_account_meta_list(
            &accounts.authority,
            &accounts.extra_metas_b,
            &accounts.system_program,
            &mint_b,
            ctx.bumps.extra_metas_b,
            &hook_account_metas(&mint_a, &game_b, &game_a, &oracle)?,
        )?;

        // Each game record becomes mint authority of the opposing mint so the
        // winner can sweep the loser's excess lamports on consume.
        for (mint, new_authority) in [(&accounts.mint_b, game_a), (&accounts.mint_a, game_b)] {
            let cpi_context = CpiContext::new(
                accounts.token_program.to_account_info(),
                SetAuthority {
                    current_authority: accounts.authority.to_account_info(),
                    account_or_mint: mint.to_account_info(),
                },
            );
            token_2022::set_authority(cpi_context, AuthorityType::MintTokens, Some(new_authority))?;
        }

        emit!(PairingRegistered {
            mint_a,
            mint_b,
            oracle,
            price,
            genesis_ts: now,
            epoch_length,
            threshold_bps,
        });

        Ok(())
    }

    /// Token-2022 calls this (through `fallback`) on every transfer of a
    /// paired mint. Failing here aborts the transfer.
    pub fn transfer_hook(ctx: Context<TransferHook>, amount: u64) -> Result<()> {
        {
            let source = ctx.accounts.source_token.to_account_info();
            let data = source.try_borrow_data()?;
            guards::require_transferring(&data)?;
        }

        let pool = ctx.accounts.oracle.to_account_info();
        let now = Clock::get()?.unix_timestamp;

        let other_game = &ctx.accounts.other_game;
        let game = &mut ctx.accounts.game;
        let settlement =
            game.on_transfer(other_game, now, |pinned| oracle::read_price(&pool, pinned))?;

        let Settlement::Settled { movement, decision } = settlement else {
            return Ok(());
        };

        msg!("{:?} side settled epoch {}: {:?}", game.side(), game.next_epoch, decision);
        emit!(EpochSettled {
            mint: game.mint,
            epoch: game.next_epoch,
            price: game.last_price,
            movement,
            decision,
            status: game.status(),
            transfer_amount: amount,
        });

        if decision == Decision::Won {
            emit!(MintWon {
                winner: game.mint,
                loser: game.other_mint,
                side: game.side(),
                epoch: game.next_epoch,
                price: game.last_price,
            });
        }

        Ok(())
    }

    /// Winning mint eats the losing one: marks the loser consumed, moves the
    /// loser's pending payout onto the winner and sweeps the loser mint's
    /// excess lamports into the winner mint.
    pub fn consume(ctx: Context<Consume>) -> Result<()> {
        let credited = ctx.accounts.game.consume(&mut ctx.accounts.other_game)?;

        let mint_info = ctx.accounts.mint.to_account_info();
        let other_mint_info = ctx.accounts.other_mint.to_account_info();
        let rent_floor = Rent::get()?.minimum_balance(other_mint_info.data_len());
        let swept_lamports = other_mint_info.lamports().saturating_sub(rent_floor);

        if swept_lamports > 0 {
            let game_info = ctx.accounts.game.to_account_info();
            let ix = spl_token_2022::instruction::withdraw_excess_lamports(
                &ctx.accounts.token_program.key(),
                other_mint_info.key,
                mint_info.key,
                game_info.key,
                &[],
            )?;
            let mint_key = ctx.accounts.mint.key();
            let signer_seeds: &[&[&[u8]]] =
                &[&[GAME_SEED, mint_key.as_ref(), &[ctx.accounts.game.bump]]];
            invoke_signed(
                &ix,
                &[
                    other_mint_info,
                    mint_info,
                    game_info,
                    ctx.accounts.token_program.to_account_info(),
                ],
                signer_seeds,
            )?;
        }

        let game = &ctx.accounts.game;
        emit!(MintEaten {
            winner: game.mint,
            loser: game.other_mint,
            credited,
            pending_payout: game.pending_payout,
            swept_lamports,
        });

        Ok(())
    }

    /// Burn tokens of a paired mint and credit the full amount to the mint's
    /// pending payout.
    pub fn burn_tokens(ctx: Context<BurnTokens>, amount: u64) -> Result<()> {
        guards::require_token_owner(&ctx.accounts.source.owner, &ctx.accounts.owner.key())?;
        let balance = ctx.accounts.source.amount;
        ctx.accounts.game.credit_burn(amount, balance)?;

        let cpi_context = CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Burn {
                mint: ctx.accounts.mint.to_account_info(),
                from: ctx.accounts.source.to_account_info(),
                authority: ctx.accounts.owner.to_account_info(),
            },
        );
        token_2022::burn(cpi_context, amount)?;

        emit!(TokensBurned {
            mint: ctx.accounts.mint.key(),
            owner: ctx.accounts.owner.key(),
            amount,
            pending_payout: ctx.accounts.game.pending_payout,
        });

        Ok(())
    }

    // Token-2022 invokes the transfer-hook interface's Execute instruction,
    // whose discriminator Anchor does not route on its own.
    pub fn fallback<'info>(
        program_id: &Pubkey,
        accounts: &'info [AccountInfo<'info>],
        data: &[u8],
    ) -> Result<()> {
        match TransferHookInstruction::unpack(data)? {
            TransferHookInstruction::Execute { amount } => {
                __private::__global::transfer_hook(program_id, accounts, &amount.to_le_bytes())
            }
            _ => Err(ProgramError::InvalidInstructionData.into()),
        }
    }
}

// === Helper Functions ===

/// How a PDA holding `current` lamports reaches `required`: an empty one is
/// created outright, a pre-funded one is topped up, allocated and assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PdaFunding {
    Create { lamports: u64 },
    Adopt { top_up: u64 },
}

impl PdaFunding {
    pub(crate) fn plan(current: u64, required: u64) -> Self {
        if current == 0 {
            PdaFunding::Create { lamports: required }
        } else {
            PdaFunding::Adopt { top_up: required.saturating_sub(current) }
        }
    }
}

fn create_extra_account_meta_list<'info>(
    payer: &Signer<'info>,
    list: &UncheckedAccount<'info>,
    system_program: &Program<'info, System>,
    mint: &Pubkey,
    bump: u8,
    metas: &[ExtraAccountMeta],
) -> Result<()> {
    let account_size = ExtraAccountMetaList::size_of(metas.len())?;
    let required = Rent::get()?.minimum_balance(account_size);
    let signer_seeds: &[&[&[u8]]] = &[&[EXTRA_ACCOUNT_METAS_SEED, mint.as_ref(), &[bump]]];
    let system = system_program.to_account_info();

    match PdaFunding::plan(list.lamports(), required) {
        PdaFunding::Create { lamports } => create_account(
            CpiContext::new(
                system,
                CreateAccount {
                    from: payer.to_account_info(),
                    to: list.to_account_info(),
                },
            )
            .with_signer(signer_seeds),
            lamports,
            account_size as u64,
            &crate::ID,
        )?,
        PdaFunding::Adopt { top_up } => {
            if top_up > 0 {
                transfer(
                    CpiContext::new(
                        system.clone(),
                        Transfer {
                            from: payer.to_account_info(),
                            to: list.to_account_info(),
                        },
                    ),
                    top_up,
                )?;
            }
            allocate(
                CpiContext::new(
                    system.clone(),
                    Allocate { account_to_allocate: list.to_account_info() },
                )
                .with_signer(signer_seeds),
                account_size as u64,
            )?;
            assign(
                CpiContext::new(system, Assign { account_to_assign: list.to_account_info() })
                    .with_signer(signer_seeds),
                &crate::ID,
            )?;
        }
    }

    ExtraAccountMetaList::init::<ExecuteInstruction>(&mut list.try_borrow_mut_data()?, metas)?;
    Ok(())
}

// === Account Structures ===

#[derive(Accounts)]
pub struct Register<'info> {
    #[account(mut)]
    pub authority: Signer<'info>,

    #[account(mut, mint::token_program = token_program)]
    pub mint_a: InterfaceAccount<'info, Mint>,

    #[account(
        mut,
        mint::token_program = token_program,
        constraint = mint_b.key() != mint_a.key() @ HookError::InvalidPairing
    )]
    pub mint_b: InterfaceAccount<'info, Mint>,

    #[account(
        init_if_needed,
        payer = authority,
        space = 8 + Game::INIT_SPACE,
        seeds = [GAME_SEED, mint_a.key().as_ref()],
        bump
    )]
    pub game_a: Account<'info, Game>,

    #[account(
        init_if_needed,
        payer = authority,
        space = 8 + Game::INIT_SPACE,
        seeds = [GAME_SEED, mint_b.key().as_ref()],
        bump
    )]
    pub game_b: Account<'info, Game>,

    /// CHECK: ExtraAccountMetaList of mint_a, created in `register`
    #[account(
        mut,
        seeds = [EXTRA_ACCOUNT_METAS_SEED, mint_a.key().as_ref()],
        bump
    )]
    pub extra_metas_a: UncheckedAccount<'info>,

    /// CHECK: ExtraAccountMetaList of mint_b, created in `register`
    #[account(
        mut,
        seeds = [EXTRA_ACCOUNT_METAS_SEED, mint_b.key().as_ref()],
        bump
    )]
    pub extra_metas_b: UncheckedAccount<'info>,

    /// CHECK: Raydium CLMM pool, owner and layout checked by `ClmmPool::load`
    pub oracle: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token2022>,
    pub system_program: Program<'info, System>,
}

// Order of accounts matters for this struct.
// The first 4 accounts are the accounts required for token transfer (source, mint, destination, owner)
// Remaining accounts are the extra accounts required from the ExtraAccountMetaList account
#[derive(Accounts)]
pub struct TransferHook<'info> {
    #[account(token::mint = mint)]
    pub source_token: InterfaceAccount<'info, TokenAccount>,

    pub mint: InterfaceAccount<'info, Mint>,

    #[account(token::mint = mint)]
    pub destination_token: InterfaceAccount<'info, TokenAccount>,

    /// CHECK: source owner or delegate, authorized by Token-2022
    pub owner: UncheckedAccount<'info>,

    /// CHECK: ExtraAccountMetaList of mint
    #[account(
        seeds = [EXTRA_ACCOUNT_METAS_SEED, mint.key().as_ref()],
        bump
    )]
    pub extra_account_meta_list: UncheckedAccount<'info>,

    pub other_mint: InterfaceAccount<'info, Mint>,

    #[account(
        mut,
        seeds = [GAME_SEED, mint.key().as_ref()],
        bump = game.bump,
        constraint = game.other_mint == other_mint.key() @ HookError::RecordMismatch
    )]
    pub game: Account<'info, Game>,

    #[account(
        seeds = [GAME_SEED, other_mint.key().as_ref()],
        bump = other_game.bump
    )]
    pub other_game: Account<'info, Game>,

    /// CHECK: pinned oracle, identity and layout checked by `oracle::read_price`
    pub oracle: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct Consume<'info> {
    pub payer: Signer<'info>,

    #[account(mut)]
    pub mint: InterfaceAccount<'info, Mint>,

    #[account(mut)]
    pub other_mint: InterfaceAccount<'info, Mint>,

    #[account(
        mut,
        seeds = [GAME_SEED, mint.key().as_ref()],
        bump = game.bump,
        constraint = game.other_mint == other_mint.key() @ HookError::InvalidPairing
    )]
    pub game: Account<'info, Game>,

    #[account(
        mut,
        seeds = [GAME_SEED, other_mint.key().as_ref()],
        bump = other_game.bump
    )]
    pub other_game: Account<'info, Game>,

    pub token_program: Program<'info, Token2022>,
}

#[derive(Accounts)]
pub struct BurnTokens<'info> {
    pub owner: Signer<'info>,

    #[account(mut, mint::token_program = token_program)]
    pub mint: InterfaceAccount<'info, Mint>,

    #[account(mut, token::mint = mint)]
    pub source: InterfaceAccount<'info, TokenAccount>,

    #[account(
        mut,
        seeds = [GAME_SEED, mint.key().as_ref()],
        bump = game.bump
    )]
    pub game: Account<'info, Game>,

    pub token_program: Program<'info, Token2022>,
}

// === Events ===

#[event]
pub struct PairingRegistered {
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub oracle: Pubkey,
    pub price: u64,
    pub genesis_ts: i64,
    pub epoch_length: i64,
    pub threshold_bps: u16,
}

#[event]
pub struct EpochSettled {
    pub mint: Pubkey,
    pub epoch: u64,
    pub price: u64,
    pub movement: Movement,
    pub decision: Decision,
    pub status: GameStatus,
    pub transfer_amount: u64,
}

#[event]
pub struct MintWon {
    pub winner: Pubkey,
    pub loser: Pubkey,
    pub side: Side,
    pub epoch: u64,
    pub price: u64,
}

#[event]
pub struct MintEaten {
    pub winner: Pubkey,
    pub loser: Pubkey,
    pub credited: u64,
    pub pending_payout: u64,
    pub swept_lamports: u64,
}

#[event]
pub struct TokensBurned {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub pending_payout: u64,
}

// === Errors ===

#[error_code]
pub enum HookError {
    #[msg("Oracle account is not a Raydium CLMM pool")]
    InvalidOracle,
    #[msg("Oracle account differs from the pinned oracle")]
    OracleMismatch,
    #[msg("Game records do not reference each other")]
    RecordMismatch,
    #[msg("Mints do not form a valid pairing")]
    InvalidPairing,
    #[msg("Mint has been consumed")]
    MintConsumed,
    #[msg("This mint has not won")]
    NotYetWon,
    #[msg("Other mint already consumed")]
    AlreadyConsumed,
    #[msg("Invalid amount")]
    InvalidAmount,
    #[msg("Pairing already registered")]
    AlreadyInitialized,
    #[msg("Unauthorized")]
    Unauthorized,
    #[msg("Invalid epoch length or threshold")]
    InvalidConfig,
    #[msg("Hook invoked outside of a token transfer")]
    NotTransferring,
    #[msg("Mint transfer hook does not point at this program")]
    HookNotInstalled,
    #[msg("Math overflow")]
    MathOverflow,
}
