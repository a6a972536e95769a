//! Outgoing transfer pool.
//!
//! Transfers wait here, indexed by token contract and fee, until a batch
//! takes them or their sender cancels. Escrowed vouchers are burned and
//! escrowed native coins stay locked in the module account; a refund reverses
//! whichever happened.

use common::{parse_voucher_denom, voucher_denom, Erc20Token, EthAddress};
use cosmwasm_std::{
    coins, Addr, Coin, Empty, MessageInfo, Order, Response, StdError, StdResult, Storage,
};

use crate::error::GravityError;
use crate::keepers::Ctx;
use crate::state::{
    fee_index_key, PendingTransfer, BATCHES, DENOM_TO_ERC20, ERC20_TO_DENOM, FEE_INDEX,
    NEXT_TRANSFER_ID, PENDING_TRANSFERS,
};

// ============================================================================
// Handlers
// ============================================================================

pub fn execute_send_to_ethereum(
    ctx: &mut Ctx,
    info: MessageInfo,
    ethereum_recipient: EthAddress,
    amount: Coin,
    bridge_fee: Coin,
) -> Result<Response, GravityError> {
    let id = enqueue(ctx, &info.sender, ethereum_recipient, &amount, &bridge_fee)?;

    Ok(Response::new()
        .add_attribute("method", "send_to_ethereum")
        .add_attribute("id", id.to_string())
        .add_attribute("sender", info.sender)
        .add_attribute("ethereum_recipient", ethereum_recipient.to_string())
        .add_attribute("amount", amount.to_string())
        .add_attribute("bridge_fee", bridge_fee.to_string()))
}

pub fn execute_cancel_send_to_ethereum(
    ctx: &mut Ctx,
    info: MessageInfo,
    id: u64,
) -> Result<Response, GravityError> {
    let transfer = remove_and_refund(ctx, id, &info.sender)?;

    Ok(Response::new()
        .add_attribute("method", "cancel_send_to_ethereum")
        .add_attribute("id", id.to_string())
        .add_attribute("refunded", (transfer.token.amount + transfer.fee.amount).to_string()))
}

// ============================================================================
// Pool Operations
// ============================================================================

/// Escrow `amount + fee` from `sender` and queue the transfer. Returns its id.
pub fn enqueue(
    ctx: &mut Ctx,
    sender: &Addr,
    ethereum_recipient: EthAddress,
    amount: &Coin,
    fee: &Coin,
) -> Result<u64, GravityError> {
    if amount.denom != fee.denom {
        return Err(GravityError::InvalidAmount {
            reason: format!(
                "fee denom {} does not match amount denom {}",
                fee.denom, amount.denom
            ),
        });
    }
    if amount.amount.is_zero() {
        return Err(GravityError::InvalidAmount {
            reason: "amount must be non-zero".to_string(),
        });
    }
    if ethereum_recipient.is_zero() {
        return Err(GravityError::InvalidAmount {
            reason: "Ethereum recipient must not be the zero address".to_string(),
        });
    }

    let (token_contract, is_voucher) = denom_to_erc20(ctx.storage, &amount.denom)?;
    let total = amount
        .amount
        .checked_add(fee.amount)
        .map_err(StdError::from)?;
    let escrow = coins(total.u128(), &amount.denom);
    ctx.bank.send_to_module(ctx.storage, sender, &escrow)?;
    if is_voucher {
        ctx.bank.burn(ctx.storage, &escrow)?;
    }

    let id = NEXT_TRANSFER_ID.may_load(ctx.storage)?.unwrap_or(1);
    NEXT_TRANSFER_ID.save(ctx.storage, &(id + 1))?;

    let transfer = PendingTransfer {
        id,
        sender: sender.clone(),
        ethereum_recipient,
        token: Erc20Token::new(token_contract, amount.amount),
        fee: Erc20Token::new(token_contract, fee.amount),
    };
    insert_into_pool(ctx.storage, &transfer)?;
    Ok(id)
}

/// Delete an unbatched transfer owned by `requester` and refund it.
///
/// Transfers that sit in an open batch cannot be cancelled; they return to
/// the pool only if the batch is cancelled.
pub fn remove_and_refund(
    ctx: &mut Ctx,
    id: u64,
    requester: &Addr,
) -> Result<PendingTransfer, GravityError> {
    let transfer = match PENDING_TRANSFERS.may_load(ctx.storage, id)? {
        Some(transfer) => transfer,
        None => {
            return Err(match batch_containing(ctx.storage, id)? {
                Some(batch_nonce) => GravityError::TransferInBatch { id, batch_nonce },
                None => GravityError::not_found("pending transfer", id),
            })
        }
    };
    if &transfer.sender != requester {
        return Err(GravityError::Unauthorized {
            reason: format!("transfer {id} belongs to {}", transfer.sender),
        });
    }

    remove_from_pool(ctx.storage, &transfer);
    refund(ctx, &transfer)?;
    Ok(transfer)
}

/// Return `amount + fee` of a transfer to its sender
pub fn refund(ctx: &mut Ctx, transfer: &PendingTransfer) -> Result<(), GravityError> {
    let (denom, native) = erc20_to_denom(ctx.storage, &transfer.token.contract)?;
    let total = transfer
        .token
        .amount
        .checked_add(transfer.fee.amount)
        .map_err(StdError::from)?;
    let funds = coins(total.u128(), denom);
    if !native {
        ctx.bank.mint(ctx.storage, &funds)?;
    }
    ctx.bank.send_from_module(ctx.storage, &transfer.sender, &funds)?;
    Ok(())
}

pub fn insert_into_pool(storage: &mut dyn Storage, transfer: &PendingTransfer) -> StdResult<()> {
    PENDING_TRANSFERS.save(storage, transfer.id, transfer)?;
    FEE_INDEX.save(
        storage,
        (
            transfer.token.contract.as_slice(),
            fee_index_key(transfer.fee.amount),
            transfer.id,
        ),
        &Empty {},
    )
}

pub fn remove_from_pool(storage: &mut dyn Storage, transfer: &PendingTransfer) {
    PENDING_TRANSFERS.remove(storage, transfer.id);
    FEE_INDEX.remove(
        storage,
        (
            transfer.token.contract.as_slice(),
            fee_index_key(transfer.fee.amount),
            transfer.id,
        ),
    );
}

/// Pending transfers of a token, highest fee first and oldest first within a
/// fee
pub fn pending_transfers_by_fee(
    storage: &dyn Storage,
    token_contract: &EthAddress,
    limit: usize,
) -> StdResult<Vec<PendingTransfer>> {
    FEE_INDEX
        .sub_prefix(token_contract.as_slice())
        .keys(storage, None, None, Order::Ascending)
        .take(limit)
        .map(|key| {
            let (_, id) = key?;
            PENDING_TRANSFERS.load(storage, id)
        })
        .collect()
}

/// Nonce of the open batch holding transfer `id`, if any
fn batch_containing(storage: &dyn Storage, id: u64) -> StdResult<Option<u64>> {
    for item in BATCHES.range(storage, None, None, Order::Ascending) {
        let (_, batch) = item?;
        if batch.transactions.iter().any(|tx| tx.id == id) {
            return Ok(Some(batch.nonce));
        }
    }
    Ok(None)
}

// ============================================================================
// Denom Mapping
// ============================================================================

/// Token contract for a denom, and whether the denom is a bridge voucher
pub fn denom_to_erc20(storage: &dyn Storage, denom: &str) -> Result<(EthAddress, bool), GravityError> {
    if let Some(contract) = parse_voucher_denom(denom) {
        return Ok((contract, true));
    }
    match DENOM_TO_ERC20.may_load(storage, denom)? {
        Some(contract) => Ok((contract, false)),
        None => Err(GravityError::ContractNotFound {
            denom: denom.to_string(),
        }),
    }
}

/// Denom for a token contract, and whether the denom is native to the chain
pub fn erc20_to_denom(storage: &dyn Storage, token_contract: &EthAddress) -> StdResult<(String, bool)> {
    Ok(match ERC20_TO_DENOM.may_load(storage, token_contract.as_slice())? {
        Some(denom) => (denom, true),
        None => (voucher_denom(token_contract), false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{account, TestApp, MODULE_ACCOUNT};
    use cosmwasm_std::{coin, Uint128};

    fn token() -> EthAddress {
        EthAddress::new([0xaa; 20])
    }

    #[test]
    fn test_enqueue_burns_vouchers_and_indexes_fee() {
        let mut app = TestApp::new();
        let sender = account("sender");
        let denom = voucher_denom(&token());
        app.fund(&sender, coin(1_000, &denom));

        let id = {
            let mut ctx = app.ctx();
            enqueue(
                &mut ctx,
                &sender,
                EthAddress::new([0x01; 20]),
                &coin(100, &denom),
                &coin(5, &denom),
            )
            .unwrap()
        };
        assert_eq!(id, 1);
        assert_eq!(app.balance(&sender, &denom), Uint128::new(895));
        assert_eq!(app.balance(&Addr::unchecked(MODULE_ACCOUNT), &denom), Uint128::zero());

        let pending = pending_transfers_by_fee(&app.storage, &token(), 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fee.amount, Uint128::new(5));
    }

    #[test]
    fn test_enqueue_rejects_unknown_denom() {
        let mut app = TestApp::new();
        let sender = account("sender");
        app.fund(&sender, coin(1_000, "uatom"));

        let mut ctx = app.ctx();
        let err = enqueue(
            &mut ctx,
            &sender,
            EthAddress::new([0x01; 20]),
            &coin(100, "uatom"),
            &coin(1, "uatom"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GravityError::ContractNotFound {
                denom: "uatom".to_string()
            }
        );
    }

    #[test]
    fn test_enqueue_rejects_mismatched_fee_denom() {
        let mut app = TestApp::new();
        let sender = account("sender");
        let denom = voucher_denom(&token());

        let mut ctx = app.ctx();
        let err = enqueue(
            &mut ctx,
            &sender,
            EthAddress::new([0x01; 20]),
            &coin(100, &denom),
            &coin(1, "uatom"),
        )
        .unwrap_err();
        assert!(matches!(err, GravityError::InvalidAmount { .. }));
    }

    #[test]
    fn test_native_denom_is_locked_not_burned() {
        let mut app = TestApp::new();
        let sender = account("sender");
        DENOM_TO_ERC20.save(&mut app.storage, "uatom", &token()).unwrap();
        ERC20_TO_DENOM
            .save(&mut app.storage, token().as_slice(), &"uatom".to_string())
            .unwrap();
        app.fund(&sender, coin(1_000, "uatom"));

        let id = {
            let mut ctx = app.ctx();
            enqueue(
                &mut ctx,
                &sender,
                EthAddress::new([0x01; 20]),
                &coin(100, "uatom"),
                &coin(10, "uatom"),
            )
            .unwrap()
        };
        assert_eq!(app.balance(&Addr::unchecked(MODULE_ACCOUNT), "uatom"), Uint128::new(110));

        {
            let mut ctx = app.ctx();
            remove_and_refund(&mut ctx, id, &sender).unwrap();
        }
        assert_eq!(app.balance(&sender, "uatom"), Uint128::new(1_000));
        assert_eq!(app.balance(&Addr::unchecked(MODULE_ACCOUNT), "uatom"), Uint128::zero());
    }

    #[test]
    fn test_refund_only_to_owner() {
        let mut app = TestApp::new();
        let sender = account("sender");
        let denom = voucher_denom(&token());
        app.fund(&sender, coin(1_000, &denom));

        let mut ctx = app.ctx();
        let id = enqueue(
            &mut ctx,
            &sender,
            EthAddress::new([0x01; 20]),
            &coin(100, &denom),
            &coin(5, &denom),
        )
        .unwrap();
        let err = remove_and_refund(&mut ctx, id, &account("mallory")).unwrap_err();
        assert!(matches!(err, GravityError::Unauthorized { .. }));
    }
}
