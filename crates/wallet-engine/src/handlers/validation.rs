//! Shared input validation for the write handlers and
//! the read handlers' not-found mapping.

use rust_decimal::Decimal;
use uuid::Uuid;
use wallet_schemas::{Wallet, WalletError};

pub(crate) fn validate_amount(amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::validation(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_reference_id(reference_id: &str) -> Result<(), WalletError> {
    if reference_id.trim().is_empty() {
        return Err(WalletError::validation("reference_id must not be empty"));
    }
    Ok(())
}

/// Map a replica lookup's `anyhow::Result<Option<Wallet>>` to a handler
/// result: a transport failure becomes `Transient`, a clean miss becomes
/// `WalletNotFound`.
pub(crate) fn validate_wallet_exists(
    lookup: anyhow::Result<Option<Wallet>>,
    wallet_id: Uuid,
) -> Result<Wallet, WalletError> {
    match lookup {
        Ok(Some(wallet)) => Ok(wallet),
        Ok(None) => Err(WalletError::wallet_not_found(wallet_id.to_string())),
        Err(error) => Err(WalletError::Transient {
            message: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::NEGATIVE_ONE).is_err());
        assert!(validate_amount(Decimal::ONE).is_ok());
    }

    #[test]
    fn empty_or_whitespace_reference_ids_are_rejected() {
        assert!(validate_reference_id("").is_err());
        assert!(validate_reference_id("   ").is_err());
        assert!(validate_reference_id("r1").is_ok());
    }
}
