use tokenstats::engine::{Aggregator, ScopeKey, ScopeKind, ScopeState};
use tokenstats::{
    Address, Decimal, Event, EventId, EventKind, ExactAmount, FreezeDirection, TimeMs, TokenRef,
    TokenType,
};
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn addr(n: u8) -> Address {
    Address::from_str(&format!("0x{:040x}", n)).unwrap()
}

const SYSTEM: u8 = 0x50;
const ALICE: u8 = 0xa1;
const BOB: u8 = 0xb0;

fn equity() -> TokenRef {
    TokenRef::new(addr(1), addr(SYSTEM), TokenType::new("equity"), 18)
}

fn stablecoin() -> TokenRef {
    TokenRef::new(addr(2), addr(SYSTEM), TokenType::new("stablecoin"), 2)
}

fn bond() -> TokenRef {
    TokenRef::new(addr(3), addr(SYSTEM), TokenType::new("bond"), 0)
        .with_bond(addr(2), ExactAmount::from(10000))
}

struct Feed {
    agg: Aggregator,
    block: u64,
}

impl Feed {
    fn new() -> Self {
        Self {
            agg: Aggregator::new(),
            block: 0,
        }
    }

    fn apply(&mut self, token: &TokenRef, kind: EventKind) -> usize {
        self.block += 1;
        let event = Event::new(
            EventId::new(self.block, 0, 0),
            TimeMs::new(self.block as i64 * 1000),
            token.clone(),
            kind,
        );
        self.agg.handle(&event)
    }

    fn created(&mut self, token: &TokenRef) {
        self.apply(token, EventKind::Created);
    }

    fn price(&mut self, token: &TokenRef, price: &str) {
        self.apply(
            token,
            EventKind::PriceChange {
                old_price: None,
                new_price: d(price),
            },
        );
    }

    fn mint(&mut self, token: &TokenRef, to: u8, amount: ExactAmount) {
        self.apply(token, EventKind::Mint { to: addr(to), amount });
    }

    fn burn(&mut self, token: &TokenRef, from: u8, amount: ExactAmount) {
        self.apply(
            token,
            EventKind::Burn {
                from: addr(from),
                amount,
            },
        );
    }

    fn transfer(&mut self, token: &TokenRef, from: u8, to: u8, amount: ExactAmount) {
        self.apply(
            token,
            EventKind::Transfer {
                from: addr(from),
                to: addr(to),
                amount,
            },
        );
    }

    fn scope(&self, key: ScopeKey) -> &ScopeState {
        self.agg
            .scope(&key)
            .unwrap_or_else(|| panic!("scope {} missing", key))
    }

    fn states(&self) -> Vec<&ScopeState> {
        self.agg.store().states().collect()
    }
}

fn token_type_scope(token_type: &str) -> ScopeKey {
    ScopeKey::SystemTokenType {
        system: addr(SYSTEM),
        token_type: TokenType::new(token_type),
    }
}

fn assert_available_invariant(feed: &Feed) {
    for state in feed.states() {
        assert_eq!(
            state.total_available_exact,
            &state.total_value_exact - &state.total_frozen_exact,
            "available invariant broken for {}",
            state.key
        );
        assert_eq!(
            state.total_available,
            &state.total_value - &state.total_frozen,
            "scaled available invariant broken for {}",
            state.key
        );
    }
}

fn assert_delta_conservation(feed: &Feed, token: &TokenRef) {
    let leaf_sum = feed
        .agg
        .balances()
        .holders(&token.address)
        .iter()
        .fold(ExactAmount::zero(), |acc, (_, leaf)| &acc + &leaf.value_exact);
    let supply = feed
        .agg
        .scope(&ScopeKey::Token {
            token: token.address.clone(),
        })
        .map(|s| s.total_value_exact.clone())
        .unwrap_or_default();
    assert_eq!(leaf_sum, supply);
}

#[test]
fn test_end_to_end_mint_then_burn() {
    let mut feed = Feed::new();
    let x = equity();
    feed.created(&x);
    feed.price(&x, "1.50");
    feed.mint(&x, ALICE, ExactAmount::from_units(1000, 18));

    let scopes = [
        ScopeKey::Account {
            account: addr(ALICE),
        },
        ScopeKey::AccountSystem {
            account: addr(ALICE),
            system: addr(SYSTEM),
        },
        ScopeKey::System {
            system: addr(SYSTEM),
        },
        token_type_scope("equity"),
        ScopeKey::Token { token: addr(1) },
    ];

    for key in scopes.clone() {
        let state = feed.scope(key);
        assert_eq!(state.total_value_exact, ExactAmount::from_units(1000, 18));
        assert_eq!(state.total_value, d("1000"));
        assert_eq!(state.total_value_in_base_currency, d("1500.00"));
    }

    feed.burn(&x, ALICE, ExactAmount::from_units(400, 18));
    for key in scopes {
        let state = feed.scope(key);
        assert_eq!(state.total_value_exact, ExactAmount::from_units(600, 18));
        assert_eq!(state.total_value_in_base_currency, d("900.00"));
    }
    assert_eq!(feed.scope(token_type_scope("equity")).percentage_of_total_supply, d("100"));
}

#[test]
fn test_bond_supply_valued_through_denomination_asset() {
    let mut feed = Feed::new();
    let usd = stablecoin();
    let b = bond();
    feed.created(&usd);
    feed.price(&usd, "2.00");
    feed.created(&b);
    // A bond's own claim never enters its valuation.
    feed.price(&b, "999");

    feed.apply(
        &b,
        EventKind::SupplyChange {
            delta: ExactAmount::from(10),
        },
    );
    assert_eq!(
        feed.scope(token_type_scope("bond")).total_value_in_base_currency,
        d("2000.00")
    );
}

#[test]
fn test_denomination_price_change_reprices_bond_holders() {
    let mut feed = Feed::new();
    let usd = stablecoin();
    let b = bond();
    feed.created(&usd);
    feed.price(&usd, "2.00");
    feed.created(&b);
    feed.mint(&b, ALICE, ExactAmount::from(10));

    let alice = || ScopeKey::Account {
        account: addr(ALICE),
    };
    assert_eq!(feed.scope(alice()).total_value_in_base_currency, d("2000"));

    feed.price(&usd, "3.00");
    assert_eq!(feed.scope(alice()).total_value_in_base_currency, d("3000"));
    assert_eq!(
        feed.scope(ScopeKey::Token { token: addr(3) }).total_value_in_base_currency,
        d("3000")
    );
    assert_eq!(
        feed.scope(ScopeKey::System {
            system: addr(SYSTEM)
        })
        .total_value_in_base_currency,
        d("3000")
    );
    assert_eq!(
        feed.scope(token_type_scope("bond")).percentage_of_total_supply,
        d("100")
    );
}

#[test]
fn test_percentage_closure() {
    let mut feed = Feed::new();
    let x = equity();
    let usd = stablecoin();
    let b = bond();
    for token in [&x, &usd, &b] {
        feed.created(token);
    }
    feed.price(&x, "1.50");
    feed.price(&usd, "1.00");

    feed.mint(&x, ALICE, ExactAmount::from_units(7, 18));
    feed.mint(&usd, BOB, ExactAmount::from(1234));
    feed.mint(&b, BOB, ExactAmount::from(3));

    let sum_percentages = |feed: &Feed| {
        feed.agg
            .store()
            .states()
            .filter(|s| s.key.kind() == ScopeKind::SystemTokenType)
            .fold(Decimal::zero(), |acc, s| {
                acc + s.percentage_of_total_supply.clone()
            })
    };
    let error = (&sum_percentages(&feed) - &Decimal::hundred()).abs();
    assert!(error < d("0.000000000001"), "sum was {}", sum_percentages(&feed));

    feed.burn(&x, ALICE, ExactAmount::from_units(7, 18));
    feed.burn(&usd, BOB, ExactAmount::from(1234));
    feed.burn(&b, BOB, ExactAmount::from(3));
    for state in feed.states() {
        if state.key.kind() == ScopeKind::SystemTokenType {
            assert!(state.percentage_of_total_supply.is_zero(), "{}", state.key);
        }
    }
}

#[test]
fn test_launch_is_idempotent() {
    let mut feed = Feed::new();
    let x = equity();
    assert_eq!(feed.apply(&x, EventKind::Launch), 1);
    assert_eq!(feed.apply(&x, EventKind::Launch), 0);

    let system = feed.scope(ScopeKey::System {
        system: addr(SYSTEM),
    });
    assert_eq!(system.launched_count, 1);
    assert_eq!(system.event_count, 1);
}

#[test]
fn test_zero_delta_is_a_no_op() {
    let mut feed = Feed::new();
    let x = equity();
    feed.mint(&x, ALICE, ExactAmount::from(5));
    let before: Vec<ScopeState> = feed.states().into_iter().cloned().collect();
    let snapshots_before = feed.agg.store().snapshots().len();

    let recorded = feed.agg.increase_balance(
        EventId::new(99, 0, 0),
        TimeMs::new(99),
        &addr(ALICE),
        &x,
        &ExactAmount::zero(),
    );
    assert_eq!(recorded, 0);
    feed.transfer(&x, ALICE, BOB, ExactAmount::zero());

    let mut after: Vec<ScopeState> = feed.states().into_iter().cloned().collect();
    let mut before = before;
    before.sort_by(|a, b| a.key.cmp(&b.key));
    after.sort_by(|a, b| a.key.cmp(&b.key));
    assert_eq!(before, after);
    assert_eq!(feed.agg.store().snapshots().len(), snapshots_before);
}

#[test]
fn test_invariants_hold_across_mixed_sequence() {
    let mut feed = Feed::new();
    let x = equity();
    feed.created(&x);
    feed.price(&x, "2");

    let unit = |n: i64| ExactAmount::from_units(n, 18);
    feed.mint(&x, ALICE, unit(100));
    assert_available_invariant(&feed);
    assert_delta_conservation(&feed, &x);

    feed.transfer(&x, ALICE, BOB, unit(30));
    feed.apply(
        &x,
        EventKind::FreezeDelta {
            account: addr(BOB),
            direction: FreezeDirection::Freeze,
            amount: unit(20),
        },
    );
    assert_available_invariant(&feed);
    assert_delta_conservation(&feed, &x);

    feed.apply(
        &x,
        EventKind::ForcedTransfer {
            from: addr(BOB),
            to: addr(ALICE),
            amount: unit(25),
        },
    );
    assert_available_invariant(&feed);
    assert_delta_conservation(&feed, &x);

    let bob = feed.agg.balances().get(&addr(BOB), &addr(1)).unwrap();
    assert_eq!(bob.value_exact, unit(5));
    assert_eq!(bob.frozen_exact, unit(5));

    feed.burn(&x, ALICE, unit(95));
    feed.apply(
        &x,
        EventKind::FreezeDelta {
            account: addr(BOB),
            direction: FreezeDirection::Unfreeze,
            amount: unit(5),
        },
    );
    feed.burn(&x, BOB, unit(5));
    assert_available_invariant(&feed);
    assert_delta_conservation(&feed, &x);

    let token = feed.scope(ScopeKey::Token { token: addr(1) });
    assert!(token.total_value_exact.is_zero());
    assert!(token.total_value_in_base_currency.is_zero());
    assert_eq!(token.token_balances_count, 0);
    let alice = feed.scope(ScopeKey::Account {
        account: addr(ALICE),
    });
    assert_eq!(alice.balances_count, 0);
}

#[test]
fn test_one_snapshot_per_scope_per_event() {
    let mut feed = Feed::new();
    let x = equity();
    feed.price(&x, "1");
    let before = feed.agg.store().snapshots().len();
    feed.mint(&x, ALICE, ExactAmount::from_units(1, 18));
    let snapshots = &feed.agg.store().snapshots()[before..];

    let mut keys: Vec<&ScopeKey> = snapshots.iter().map(|s| s.key()).collect();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total);
    // Four account-side scopes plus three supply-side scopes.
    assert_eq!(total, 7);
    assert!(snapshots.iter().all(|s| s.event == EventId::new(feed.block, 0, 0)));
}

fn base_value(feed: &Feed, key: ScopeKey) -> Decimal {
    feed.scope(key).total_value_in_base_currency.clone()
}

#[test]
fn test_price_change_reprices_existing_holdings() {
    let mut feed = Feed::new();
    let x = equity();
    let usd = stablecoin();
    feed.created(&x);
    feed.created(&usd);
    feed.price(&x, "1.50");
    feed.price(&usd, "1.00");
    feed.mint(&x, ALICE, ExactAmount::from_units(100, 18));
    feed.mint(&x, BOB, ExactAmount::from_units(60, 18));
    feed.mint(&usd, BOB, ExactAmount::from(8000));

    assert_eq!(base_value(&feed, ScopeKey::Token { token: addr(1) }), d("240"));
    assert_eq!(
        feed.scope(token_type_scope("equity")).percentage_of_total_supply,
        d("75")
    );

    feed.price(&x, "2.00");

    assert_eq!(base_value(&feed, ScopeKey::Token { token: addr(1) }), d("320"));
    assert_eq!(
        base_value(&feed, ScopeKey::System { system: addr(SYSTEM) }),
        d("400")
    );
    assert_eq!(base_value(&feed, token_type_scope("equity")), d("320"));
    assert_eq!(
        feed.scope(token_type_scope("equity")).percentage_of_total_supply,
        d("80")
    );
    assert_eq!(
        feed.scope(token_type_scope("stablecoin")).percentage_of_total_supply,
        d("20")
    );

    for key in ScopeKey::balance_scopes(&addr(ALICE), &x) {
        assert_eq!(base_value(&feed, key), d("200"));
    }
    // Bob's cross-type scopes also hold 80.00 of stablecoin.
    let [account, account_system, account_type, account_system_type] =
        ScopeKey::balance_scopes(&addr(BOB), &x);
    assert_eq!(base_value(&feed, account), d("200"));
    assert_eq!(base_value(&feed, account_system), d("200"));
    assert_eq!(base_value(&feed, account_type), d("120"));
    assert_eq!(base_value(&feed, account_system_type), d("120"));
}

#[test]
fn test_stale_reported_old_price_uses_recorded_claim() {
    let mut feed = Feed::new();
    let x = equity();
    feed.price(&x, "2.00");
    feed.mint(&x, ALICE, ExactAmount::from_units(160, 18));
    assert_eq!(base_value(&feed, ScopeKey::Token { token: addr(1) }), d("320"));

    feed.apply(
        &x,
        EventKind::PriceChange {
            old_price: Some(d("5.00")),
            new_price: d("2.50"),
        },
    );

    assert_eq!(feed.agg.prices().get(&addr(1)), Some(&d("2.50")));
    assert_eq!(base_value(&feed, ScopeKey::Token { token: addr(1) }), d("400"));
    assert_eq!(
        base_value(&feed, ScopeKey::Account { account: addr(ALICE) }),
        d("400")
    );
}

#[test]
fn test_changed_bond_terms_reprice_existing_holdings() {
    let mut feed = Feed::new();
    let usd = stablecoin();
    let b = bond();
    feed.created(&usd);
    feed.price(&usd, "2.00");
    feed.created(&b);
    feed.mint(&b, ALICE, ExactAmount::from(10));
    assert_eq!(base_value(&feed, ScopeKey::Token { token: addr(3) }), d("2000"));

    // Face value doubles from 100.00 to 200.00.
    let revised = TokenRef::new(addr(3), addr(SYSTEM), TokenType::new("bond"), 0)
        .with_bond(addr(2), ExactAmount::from(20000));
    feed.apply(&revised, EventKind::Launch);

    assert_eq!(base_value(&feed, ScopeKey::Token { token: addr(3) }), d("4000"));
    for key in ScopeKey::balance_scopes(&addr(ALICE), &revised) {
        assert_eq!(base_value(&feed, key), d("4000"));
    }
    assert_eq!(feed.agg.unit_price(&revised), d("400"));

    feed.burn(&revised, ALICE, ExactAmount::from(10));
    let supply = feed.scope(ScopeKey::Token { token: addr(3) });
    assert!(supply.total_value_exact.is_zero());
    assert!(supply.total_value_in_base_currency.is_zero());
    let account = feed.scope(ScopeKey::Account {
        account: addr(ALICE),
    });
    assert!(account.total_value_in_base_currency.is_zero());
}

#[test]
fn test_changed_bond_terms_in_a_burn_leave_no_residue() {
    let mut feed = Feed::new();
    let usd = stablecoin();
    feed.created(&usd);
    feed.price(&usd, "2");
    feed.mint(&bond(), ALICE, ExactAmount::from(10));

    let revised = TokenRef::new(addr(3), addr(SYSTEM), TokenType::new("bond"), 0)
        .with_bond(addr(2), ExactAmount::from(20000));
    feed.burn(&revised, ALICE, ExactAmount::from(10));

    for key in [
        ScopeKey::Token { token: addr(3) },
        ScopeKey::Account {
            account: addr(ALICE),
        },
        ScopeKey::System {
            system: addr(SYSTEM),
        },
    ] {
        let state = feed.scope(key);
        assert!(state.total_value_exact.is_zero());
        assert!(state.total_value_in_base_currency.is_zero(), "{}", state.key);
    }
}
