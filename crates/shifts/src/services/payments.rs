//! Running sales totals and payment breakdown sums.

use std::sync::Arc;

use tracing::{debug, instrument};

use fuel_station_core::{Money, ShiftId};

use crate::models::{PaymentMethodEntry, ShiftPaymentMethod};
use crate::store::{ShiftStore, StoreError};

/// Computes a shift's sales total from the sales tagged with it.
#[derive(Clone)]
pub struct PaymentAggregator {
    store: Arc<dyn ShiftStore>,
}

impl PaymentAggregator {
    /// Create an aggregator reading from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ShiftStore>) -> Self {
        Self { store }
    }

    /// Sum of sale amounts tagged with `shift_id`; missing amounts count as
    /// zero. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns the store error if the sales query fails.
    #[instrument(skip(self), fields(shift_id = %shift_id))]
    pub async fn refresh_total(&self, shift_id: ShiftId) -> Result<Money, StoreError> {
        let amounts = self.store.sale_amounts(shift_id).await?;
        let sales = amounts.len();
        let total: Money = amounts.into_iter().map(Option::unwrap_or_default).sum();
        debug!(sales, total = %total, "Refreshed shift sales total");
        Ok(total)
    }
}

/// Total of a payment breakdown as supplied at close.
#[must_use]
pub fn declared_total(entries: &[PaymentMethodEntry]) -> Money {
    entries.iter().map(|e| e.amount).sum()
}

/// Total of recorded payment-method rows.
#[must_use]
pub fn recorded_total(records: &[ShiftPaymentMethod]) -> Money {
    records.iter().map(|r| r.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryShiftStore, StoreOperation};
    use fuel_station_core::PaymentMethod;

    #[tokio::test]
    async fn test_missing_amounts_count_as_zero() {
        let store = Arc::new(InMemoryShiftStore::new());
        let shift = ShiftId::new(1);
        store.record_sale(shift, Some(Money::from_minor(1_500)));
        store.record_sale(shift, None);
        store.record_sale(shift, Some(Money::from_minor(250)));
        store.record_sale(ShiftId::new(2), Some(Money::from_minor(99_999)));

        let aggregator = PaymentAggregator::new(store);
        assert_eq!(
            aggregator.refresh_total(shift).await.unwrap(),
            Money::from_minor(1_750)
        );
    }

    #[tokio::test]
    async fn test_no_sales_is_zero() {
        let aggregator = PaymentAggregator::new(Arc::new(InMemoryShiftStore::new()));
        assert_eq!(
            aggregator.refresh_total(ShiftId::new(1)).await.unwrap(),
            Money::ZERO
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_returned() {
        let store = Arc::new(InMemoryShiftStore::new());
        store.fail_next(StoreOperation::SaleAmounts, 1);
        let aggregator = PaymentAggregator::new(store);
        assert!(aggregator.refresh_total(ShiftId::new(1)).await.is_err());
    }

    #[test]
    fn test_declared_total() {
        let entries = [
            PaymentMethodEntry::new(PaymentMethod::Cash, Money::from_minor(7_000)),
            PaymentMethodEntry::new(PaymentMethod::MobilePayment, Money::from_minor(500)),
        ];
        assert_eq!(declared_total(&entries), Money::from_minor(7_500));
    }
}
