//! Order totals and the platform fee policy.

use serde::{Deserialize, Serialize};

use ticketforge_core::ValueObject;

use crate::order::{OrderItem, OrderTotals};

/// Default platform fee: 5% of subtotal.
pub const DEFAULT_FEE_BASIS_POINTS: u32 = 500;

/// Platform service-fee policy, in basis points of the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub fee_basis_points: u32,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            fee_basis_points: DEFAULT_FEE_BASIS_POINTS,
        }
    }
}

impl FeePolicy {
    pub fn new(fee_basis_points: u32) -> Self {
        Self { fee_basis_points }
    }

    /// Fee on `subtotal`, rounded to the nearest minor unit (half up).
    pub fn service_fee(&self, subtotal: u64) -> u64 {
        (subtotal * u64::from(self.fee_basis_points) + 5_000) / 10_000
    }

    /// Totals for an item list. The grand total never goes below zero:
    /// `total = max(0, subtotal + fee - discount)`.
    pub fn totals(&self, items: &[OrderItem], discount: u64) -> OrderTotals {
        let subtotal: u64 = items.iter().map(OrderItem::subtotal).sum();
        let service_fee = self.service_fee(subtotal);
        let total = (subtotal + service_fee).saturating_sub(discount);
        OrderTotals {
            subtotal,
            service_fee,
            discount,
            total,
        }
    }
}

impl ValueObject for FeePolicy {}
