//! FIFO batch selection
//!
//! Unpinned consumption draws from exactly one batch: the oldest active lot
//! that still holds stock. A request the oldest lot cannot cover fails instead
//! of spilling into the next lot; callers that want partial fulfilment issue
//! several smaller requests.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::models::MaterialBatch;

/// Active and not yet drawn down to zero. Expiry does not matter here.
pub fn is_fifo_eligible(batch: &MaterialBatch) -> bool {
    batch.is_active && batch.current_qty > Decimal::ZERO
}

/// Oldest eligible batch by purchase date, ties broken by batch number
pub fn fifo_candidate(batches: &[MaterialBatch]) -> Option<&MaterialBatch> {
    batches
        .iter()
        .filter(|b| is_fifo_eligible(b))
        .min_by(|a, b| {
            a.purchase_date
                .cmp(&b.purchase_date)
                .then_with(|| a.batch_number.cmp(&b.batch_number))
        })
}

/// Pick the batch an unpinned consumption of `quantity` should draw from.
///
/// `Ok(None)` means the material has no eligible batch and the consumption is
/// recorded without one, costed at the material's average cost.
pub fn select_fifo_batch(
    batches: &[MaterialBatch],
    quantity: Decimal,
) -> LedgerResult<Option<&MaterialBatch>> {
    let Some(batch) = fifo_candidate(batches) else {
        return Ok(None);
    };
    if batch.current_qty < quantity {
        return Err(LedgerError::InsufficientQuantity {
            batch_number: batch.batch_number.clone(),
            requested: quantity,
            available: batch.current_qty,
        });
    }
    Ok(Some(batch))
}

/// A caller-chosen batch must belong to the material and still be active.
/// There is no fallback to other batches.
pub fn validate_pinned_batch(batch: &MaterialBatch, material_id: Uuid) -> LedgerResult<()> {
    if batch.material_id != material_id {
        return Err(LedgerError::invalid(
            "batchId",
            format!("batch {} belongs to another material", batch.batch_number),
        ));
    }
    if !batch.is_active {
        return Err(LedgerError::invalid(
            "batchId",
            format!("batch {} is inactive", batch.batch_number),
        ));
    }
    Ok(())
}
