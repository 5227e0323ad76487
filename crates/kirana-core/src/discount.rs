//! # Discount Resolution
//!
//! Pure logic for resolving the candidate discounts that apply to a
//! transaction.
//!
//! ## Three Independent Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Discount Sources                               │
//! │                                                                     │
//! │  1. Global discount    single active `discounts` row, or 0          │
//! │  2. Tier rule          active `discount_rules` row whose            │
//! │                        [min, max) range contains the cart total     │
//! │  3. Customer override  flat bps stored on the customer row          │
//! │                                                                     │
//! │  The resolver NEVER combines them. All three are surfaced in a      │
//! │  DiscountQuote and the billing call site decides which applies      │
//! │  before computing discount_amount.                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rule Overlap Tie-Break
//! Multiple active rules may match the same cart total. The tie-break is
//! explicit: the highest percentage wins; equal percentages fall back to
//! the lowest rule id, which keeps the choice stable across reads.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::DiscountRule;

// =============================================================================
// Discount Quote
// =============================================================================

/// The three candidate discounts for a transaction, in basis points.
///
/// Produced by the discount repository; consumed by the billing call
/// site, which picks one (or none) and computes `discount_amount` before
/// handing totals to the sale coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountQuote {
    /// Active global discount, 0 when none is active.
    pub global_bps: i64,
    /// Best matching tier rule for the cart total, 0 when none matches.
    pub rule_bps: i64,
    /// The customer's flat override, 0 when no customer or no override.
    pub customer_bps: i64,
}

impl DiscountQuote {
    /// A quote with no discounts from any source.
    pub const fn none() -> Self {
        DiscountQuote {
            global_bps: 0,
            rule_bps: 0,
            customer_bps: 0,
        }
    }
}

// =============================================================================
// Rule Matching
// =============================================================================

/// Whether `rule` covers `cart_total`. The range is `[min, max)` with
/// `max_amount = 0` treated as unbounded.
pub fn rule_matches(rule: &DiscountRule, cart_total: Money) -> bool {
    let total = cart_total.paise();
    if total < rule.min_amount_paise {
        return false;
    }
    rule.max_amount_paise == 0 || total < rule.max_amount_paise
}

/// Picks the applicable rule percentage from a set of active rules.
///
/// Returns 0 bps when nothing matches. Overlapping matches resolve to
/// the highest percentage; equal percentages resolve to the lowest id.
pub fn best_rule_bps(rules: &[DiscountRule], cart_total: Money) -> i64 {
    rules
        .iter()
        .filter(|r| r.is_active && rule_matches(r, cart_total))
        // max_by_key keeps the later element on ties, so order the key to
        // prefer (higher bps, lower id)
        .max_by_key(|r| (r.percent_bps, -r.id))
        .map(|r| r.percent_bps)
        .unwrap_or(0)
}

// =============================================================================
// Unit Tests
// =============================================================================
