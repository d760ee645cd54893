//! Running totals for one scope and the deltas applied to them.

use super::scope::ScopeKey;
use crate::domain::{Decimal, EventId, ExactAmount, TimeMs};
use serde::{Deserialize, Serialize};

/// The live aggregate row for one scope.
///
/// Exact and scaled fields move together; `total_available*` is always
/// `total_value* - total_frozen*` and is recomputed on every value or frozen
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeState {
    pub key: ScopeKey,
    pub total_value_exact: ExactAmount,
    pub total_value: Decimal,
    pub total_frozen_exact: ExactAmount,
    pub total_frozen: Decimal,
    pub total_available_exact: ExactAmount,
    pub total_available: Decimal,
    pub total_value_in_base_currency: Decimal,
    /// Leaf balances contributing to an account-side scope.
    pub balances_count: i64,
    /// Leaf balances contributing to a supply-side scope.
    pub token_balances_count: i64,
    /// Tokens in the scope (system and system × token type scopes).
    pub count: i64,
    /// Launched tokens (system scopes).
    pub launched_count: i64,
    pub percentage_of_total_supply: Decimal,
    pub event_count: i64,
    pub last_event: Option<EventId>,
    pub last_updated: Option<TimeMs>,
}

impl ScopeState {
    /// A zero-initialized state.
    pub fn new(key: ScopeKey) -> Self {
        Self {
            key,
            total_value_exact: ExactAmount::zero(),
            total_value: Decimal::zero(),
            total_frozen_exact: ExactAmount::zero(),
            total_frozen: Decimal::zero(),
            total_available_exact: ExactAmount::zero(),
            total_available: Decimal::zero(),
            total_value_in_base_currency: Decimal::zero(),
            balances_count: 0,
            token_balances_count: 0,
            count: 0,
            launched_count: 0,
            percentage_of_total_supply: Decimal::zero(),
            event_count: 0,
            last_event: None,
            last_updated: None,
        }
    }

    /// Apply every component of `delta` in one step.
    pub fn apply(&mut self, delta: &ScopeDelta) {
        let touches_balance = !delta.value_exact.is_zero() || !delta.frozen_exact.is_zero();

        if !delta.value_exact.is_zero() {
            self.total_value_exact += &delta.value_exact;
            self.total_value += &delta.value_exact.to_scaled(delta.decimals);
        }
        if !delta.frozen_exact.is_zero() {
            self.total_frozen_exact += &delta.frozen_exact;
            self.total_frozen += &delta.frozen_exact.to_scaled(delta.decimals);
        }
        if touches_balance {
            self.total_available_exact = &self.total_value_exact - &self.total_frozen_exact;
            self.total_available = &self.total_value - &self.total_frozen;
        }

        self.total_value_in_base_currency += &delta.base_value;
        self.balances_count += delta.balances_count;
        self.token_balances_count += delta.token_balances_count;
        self.count += delta.count;
        self.launched_count += delta.launched_count;
    }

    /// Mark the state as touched by `event`.
    pub fn stamp(&mut self, event: EventId, timestamp: TimeMs) {
        self.event_count += 1;
        self.last_event = Some(event);
        self.last_updated = Some(timestamp);
    }
}

/// A signed change to one scope.
///
/// `decimals` is the precision of the token the exact amounts are expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeDelta {
    pub decimals: u8,
    pub value_exact: ExactAmount,
    pub frozen_exact: ExactAmount,
    pub base_value: Decimal,
    pub balances_count: i64,
    pub token_balances_count: i64,
    pub count: i64,
    pub launched_count: i64,
}

impl ScopeDelta {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals,
            ..Self::default()
        }
    }

    pub fn value(mut self, value_exact: ExactAmount) -> Self {
        self.value_exact = value_exact;
        self
    }

    pub fn frozen(mut self, frozen_exact: ExactAmount) -> Self {
        self.frozen_exact = frozen_exact;
        self
    }

    pub fn base_value(mut self, base_value: Decimal) -> Self {
        self.base_value = base_value;
        self
    }

    pub fn balances(mut self, balances_count: i64) -> Self {
        self.balances_count = balances_count;
        self
    }

    pub fn token_balances(mut self, token_balances_count: i64) -> Self {
        self.token_balances_count = token_balances_count;
        self
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    pub fn launched(mut self, launched_count: i64) -> Self {
        self.launched_count = launched_count;
        self
    }

    /// True when applying this delta would change nothing.
    pub fn is_zero(&self) -> bool {
        self.value_exact.is_zero()
            && self.frozen_exact.is_zero()
            && self.base_value.is_zero()
            && self.balances_count == 0
            && self.token_balances_count == 0
            && self.count == 0
            && self.launched_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use std::str::FromStr;

    fn key() -> ScopeKey {
        ScopeKey::Account {
            account: Address::from_str("0x0000000000000000000000000000000000000002").unwrap(),
        }
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_new_state_is_zeroed() {
        let state = ScopeState::new(key());
        assert!(state.total_value_exact.is_zero());
        assert!(state.total_value_in_base_currency.is_zero());
        assert_eq!(state.balances_count, 0);
        assert_eq!(state.last_event, None);
    }

    #[test]
    fn test_apply_keeps_exact_and_scaled_in_lockstep() {
        let mut state = ScopeState::new(key());
        state.apply(&ScopeDelta::new(2).value(ExactAmount::from(12345)));
        assert_eq!(state.total_value_exact, ExactAmount::from(12345));
        assert_eq!(state.total_value, d("123.45"));
        assert_eq!(state.total_available, d("123.45"));
    }

    #[test]
    fn test_available_is_value_minus_frozen() {
        let mut state = ScopeState::new(key());
        state.apply(&ScopeDelta::new(0).value(ExactAmount::from(100)));
        state.apply(&ScopeDelta::new(0).frozen(ExactAmount::from(30)));
        assert_eq!(state.total_available_exact, ExactAmount::from(70));
        assert_eq!(state.total_available, d("70"));

        state.apply(&ScopeDelta::new(0).value(ExactAmount::from(-50)));
        assert_eq!(state.total_available_exact, ExactAmount::from(20));

        state.apply(&ScopeDelta::new(0).frozen(ExactAmount::from(-30)));
        assert_eq!(state.total_available_exact, ExactAmount::from(50));
        assert_eq!(
            state.total_available_exact,
            &state.total_value_exact - &state.total_frozen_exact
        );
    }

    #[test]
    fn test_mixed_precision_accumulates_scaled_per_delta() {
        let mut state = ScopeState::new(key());
        state.apply(&ScopeDelta::new(18).value(ExactAmount::from_units(1, 18)));
        state.apply(&ScopeDelta::new(6).value(ExactAmount::from_units(2, 6)));
        assert_eq!(state.total_value, d("3"));
    }

    #[test]
    fn test_counters_and_stamp() {
        let mut state = ScopeState::new(key());
        state.apply(
            &ScopeDelta::new(0)
                .balances(1)
                .token_balances(2)
                .count(1)
                .launched(1)
                .base_value(d("9.5")),
        );
        state.stamp(EventId::new(7, 0, 1), TimeMs::new(70));
        assert_eq!(state.balances_count, 1);
        assert_eq!(state.token_balances_count, 2);
        assert_eq!(state.count, 1);
        assert_eq!(state.launched_count, 1);
        assert_eq!(state.total_value_in_base_currency, d("9.5"));
        assert_eq!(state.event_count, 1);
        assert_eq!(state.last_event, Some(EventId::new(7, 0, 1)));
    }

    #[test]
    fn test_zero_delta_detection() {
        assert!(ScopeDelta::new(18).is_zero());
        assert!(ScopeDelta::new(18).value(ExactAmount::zero()).is_zero());
        assert!(!ScopeDelta::new(18).balances(-1).is_zero());
        assert!(!ScopeDelta::new(18).base_value(d("0.01")).is_zero());
    }
}
