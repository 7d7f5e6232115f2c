//! Cost model: deterministic fee and duration arithmetic
//!
//! Pure functions over ledger genesis constants. No I/O and no shared
//! state, so every rule here is unit-testable without mocks. Callers pass
//! unsigned quantities; costs and durations can never go negative.

use std::time::Duration;

use crate::address::MAX_SPACE_NAME_LEN;
use crate::types::SpaceId;

/// Flat fee charged for any token transfer
pub const TRANSFER_COST: u64 = 100;

/// Hard cap on a single transfer amount
pub const MAX_TRANSFER_AMOUNT: u64 = 100_000_000;

/// Base price per purchased storage-unit on a lifeline extension
pub const LIFELINE_UNIT_PRICE: u64 = 100;

/// Seconds of life one purchased unit buys a space storing exactly one unit
pub const CLAIM_REWARD_SECS: u64 = 60 * 60 * 24 * 30;

/// The flat transfer fee
///
/// Constant for the lifetime of the session; callers reserve
/// `balance - transfer_cost()` as the spendable maximum.
pub fn transfer_cost() -> u64 {
    TRANSFER_COST
}

/// Largest amount a wallet holding `balance` may transfer
///
/// `min(MAX_TRANSFER_AMOUNT, balance - fee)`, floored at zero when the
/// balance cannot even cover the fee.
pub fn max_transfer_amount(balance: u64) -> u64 {
    balance.saturating_sub(TRANSFER_COST).min(MAX_TRANSFER_AMOUNT)
}

/// Pricing weight for a space name: shorter names are denser and cost more
fn name_weight(space: &SpaceId) -> u64 {
    let len = space.len().max(1);
    ((MAX_SPACE_NAME_LEN / len / 4) as u64).max(1)
}

/// Cost to extend `space` by `additional_units` storage-units
///
/// Zero at zero units and non-decreasing in `additional_units`; arithmetic
/// saturates instead of wrapping on absurd inputs.
pub fn lifeline_cost(space: &SpaceId, additional_units: u64) -> u64 {
    additional_units.saturating_mul(LIFELINE_UNIT_PRICE.saturating_mul(name_weight(space)))
}

/// How much life `additional_units` buys a space already storing
/// `current_units`
///
/// The more a space stores, the less time each purchased unit is worth.
pub fn lifeline_duration(additional_units: u64, current_units: u64) -> Duration {
    let secs = additional_units.saturating_mul(CLAIM_REWARD_SECS) / current_units.max(1);
    Duration::from_secs(secs)
}

/// Human-scale rendering of the extension bought by `additional_units`
///
/// Exactly `"0"` when nothing is being added.
pub fn display_lifeline_time(additional_units: u64, current_units: u64) -> String {
    if additional_units == 0 {
        return "0".to_string();
    }
    humanize_duration(lifeline_duration(additional_units, current_units))
}

/// Absolute expiry reached by adding `additional_units` on top of
/// `current_units`, starting from `current_expiry` (unix seconds)
///
/// Equals `current_expiry` exactly when `additional_units == 0`.
pub fn extend_to_time(additional_units: u64, current_units: u64, current_expiry: i64) -> i64 {
    let extension = lifeline_duration(additional_units, current_units).as_secs();
    current_expiry.saturating_add(extension.min(i64::MAX as u64) as i64)
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Coarse single-unit rendering in the largest sensible unit
fn humanize_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (count, unit) = if secs >= DAY {
        (secs / DAY, "day")
    } else if secs >= HOUR {
        (secs / HOUR, "hour")
    } else if secs >= MINUTE {
        (secs / MINUTE, "minute")
    } else {
        (secs, "second")
    };
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}
