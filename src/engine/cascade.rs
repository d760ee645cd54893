//! Keeps the per-token-type share of system value consistent.

use super::scope::ScopeKey;
use super::store::ScopeStore;
use super::timeseries::TimeseriesRecorder;
use crate::domain::{Address, Decimal, TokenType};
use tracing::debug;

/// Fractional digits kept on `percentage_of_total_supply`.
pub const PERCENTAGE_DP: i64 = 18;

/// `100 × value / system_total`, defined as zero for a zero system total.
pub fn percentage_of(value: &Decimal, system_total: &Decimal) -> Decimal {
    if system_total.is_zero() {
        return Decimal::zero();
    }
    (&(&Decimal::hundred() * value) / system_total).round_dp(PERCENTAGE_DP)
}

/// Recompute the percentage of every token-type scope under `system` against
/// `system_total`. All siblings are treated alike; `changed` names the token
/// type that triggered the pass and is only logged.
///
/// Scopes whose percentage actually moves are marked on `recorder`. Returns
/// how many moved.
pub fn cascade_after_token_type_change<S: ScopeStore + ?Sized>(
    store: &mut S,
    system: &Address,
    changed: &TokenType,
    system_total: &Decimal,
    recorder: &mut TimeseriesRecorder,
) -> usize {
    let mut moved = 0;
    for key in store.token_type_scopes(system) {
        let current = match store.get(&key) {
            Some(state) => state,
            None => continue,
        };
        let percentage = percentage_of(&current.total_value_in_base_currency, system_total);
        if percentage == current.percentage_of_total_supply {
            continue;
        }
        store.fetch_or_init(&key).percentage_of_total_supply = percentage;
        recorder.touch(&key);
        moved += 1;
    }

    debug!(
        system = %system,
        changed = %changed,
        system_total = %system_total,
        moved,
        "Percentage cascade applied"
    );
    moved
}

/// Convenience: read the system total from the store, then cascade.
pub fn cascade_for_system<S: ScopeStore + ?Sized>(
    store: &mut S,
    system: &Address,
    changed: &TokenType,
    recorder: &mut TimeseriesRecorder,
) -> usize {
    let system_total = store
        .get(&ScopeKey::System {
            system: system.clone(),
        })
        .map(|s| s.total_value_in_base_currency.clone())
        .unwrap_or_default();
    cascade_after_token_type_change(store, system, changed, &system_total, recorder)
}
