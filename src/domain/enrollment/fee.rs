//! Fee resolution.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Money;

use super::{EnrollableItem, EnrollmentError};

/// Amount to charge for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub amount: Money,
    pub is_free: bool,
}

/// Resolves what an enrollment costs.
///
/// The stored fee is the only source of truth. Client-asserted amounts are
/// checked against it, never used in its place.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeResolver;

impl FeeResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, item: &EnrollableItem) -> FeeQuote {
        FeeQuote {
            amount: item.fee,
            is_free: item.fee.is_zero(),
        }
    }

    /// Fails closed when the client asserted an amount that differs from the quote.
    pub fn verify(&self, quote: &FeeQuote, asserted: Option<Money>) -> Result<(), EnrollmentError> {
        match asserted {
            Some(amount) if amount != quote.amount => {
                Err(EnrollmentError::invalid_payment_request(format!(
                    "requested amount {} does not match fee {}",
                    amount, quote.amount
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ItemId;
    use proptest::prelude::*;

    fn club(cents: i64) -> EnrollableItem {
        EnrollableItem::club(ItemId::new(), "Club", Money::from_cents(cents).unwrap())
    }

    #[test]
    fn zero_fee_is_free() {
        let quote = FeeResolver::new().resolve(&club(0));
        assert!(quote.is_free);
        assert_eq!(quote.amount, Money::ZERO);
    }

    #[test]
    fn paid_fee_is_not_free() {
        let quote = FeeResolver::new().resolve(&club(1000));
        assert!(!quote.is_free);
        assert_eq!(quote.amount.cents(), 1000);
    }

    #[test]
    fn mismatched_assertion_is_rejected() {
        let resolver = FeeResolver::new();
        let quote = resolver.resolve(&club(1000));
        let err = resolver
            .verify(&quote, Some(Money::from_cents(1).unwrap()))
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidPaymentRequest { .. }));
    }

    #[test]
    fn missing_assertion_accepts_quote() {
        let resolver = FeeResolver::new();
        let quote = resolver.resolve(&club(1000));
        assert!(resolver.verify(&quote, None).is_ok());
    }

    proptest! {
        #[test]
        fn is_free_iff_amount_zero(cents in 0i64..1_000_000) {
            let quote = FeeResolver::new().resolve(&club(cents));
            prop_assert_eq!(quote.is_free, cents == 0);
            prop_assert_eq!(quote.amount.cents(), cents);
        }

        #[test]
        fn only_exact_assertion_verifies(fee in 0i64..100_000, asserted in 0i64..100_000) {
            let resolver = FeeResolver::new();
            let quote = resolver.resolve(&club(fee));
            let result = resolver.verify(&quote, Some(Money::from_cents(asserted).unwrap()));
            prop_assert_eq!(result.is_ok(), fee == asserted);
        }
    }
}
