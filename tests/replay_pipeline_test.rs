use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use tokenstats::engine::{ScopeKey, ScopeKind};
use tokenstats::{
    init_db, Address, Aggregator, Decimal, Event, EventId, EventKind, ExactAmount, JsonlEventSource,
    MockEventSource, Replayer, Repository, TimeMs, TokenRef, TokenType,
};

fn addr(n: u8) -> Address {
    Address::from_str(&format!("0x{:040x}", n)).unwrap()
}

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

async fn setup_repo(temp_dir: &TempDir, name: &str) -> Arc<Repository> {
    let db_path = temp_dir
        .path()
        .join(name)
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    Arc::new(Repository::new(pool))
}

fn stablecoin() -> TokenRef {
    TokenRef::new(addr(2), addr(9), TokenType::new("stablecoin"), 2)
}

fn bond() -> TokenRef {
    TokenRef::new(addr(3), addr(9), TokenType::new("bond"), 0)
        .with_bond(addr(2), ExactAmount::from(10000))
}

fn event(block: u64, token: TokenRef, kind: EventKind) -> Event {
    Event::new(
        EventId::new(block, 0, 0),
        TimeMs::new(block as i64 * 1000),
        token,
        kind,
    )
}

fn scenario() -> Vec<Event> {
    vec![
        event(1, stablecoin(), EventKind::Created),
        event(
            2,
            stablecoin(),
            EventKind::PriceChange {
                old_price: None,
                new_price: d("2.00"),
            },
        ),
        event(3, bond(), EventKind::Created),
        event(
            4,
            bond(),
            EventKind::Mint {
                to: addr(0xa),
                amount: ExactAmount::from(10),
            },
        ),
        event(
            5,
            stablecoin(),
            EventKind::Mint {
                to: addr(0xb),
                amount: ExactAmount::from(5000),
            },
        ),
        event(
            6,
            bond(),
            EventKind::Transfer {
                from: addr(0xa),
                to: addr(0xb),
                amount: ExactAmount::from(4),
            },
        ),
        event(
            7,
            stablecoin(),
            EventKind::PriceChange {
                old_price: Some(d("2.00")),
                new_price: d("2.50"),
            },
        ),
        event(8, bond(), EventKind::Launch),
        event(
            9,
            bond(),
            EventKind::Burn {
                from: addr(0xb),
                amount: ExactAmount::from(1),
            },
        ),
    ]
}

async fn all_states(repo: &Repository) -> Vec<tokenstats::ScopeState> {
    let mut states = Vec::new();
    for kind in [
        ScopeKind::Account,
        ScopeKind::AccountSystem,
        ScopeKind::AccountTokenType,
        ScopeKind::AccountSystemTokenType,
        ScopeKind::System,
        ScopeKind::SystemTokenType,
        ScopeKind::Token,
    ] {
        states.extend(repo.list_scope_states(kind).await.unwrap());
    }
    states
}

#[tokio::test]
async fn test_replay_persists_scope_states() {
    let temp_dir = TempDir::new().unwrap();
    let repo = setup_repo(&temp_dir, "single.db").await;
    let source = Arc::new(MockEventSource::new().with_events(scenario()));
    let replayer = Replayer::new(source, repo.clone(), 100);

    let mut aggregator = Aggregator::new();
    let result = replayer.replay_incremental(&mut aggregator).await.unwrap();
    assert_eq!(result.events_applied, 9);
    assert_eq!(result.batches, 1);

    // 9 bonds outstanding at 100.00 x 2.50.
    let bond_supply = repo
        .get_scope_state(&ScopeKey::Token { token: addr(3) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bond_supply.total_value_exact, ExactAmount::from(9));
    assert_eq!(bond_supply.total_value_in_base_currency, d("2250"));

    let holder = repo
        .get_scope_state(&ScopeKey::Account { account: addr(0xb) })
        .await
        .unwrap()
        .unwrap();
    // 3 bonds at 250 plus 50.00 stablecoin at 2.50.
    assert_eq!(holder.total_value_in_base_currency, d("875"));
    assert_eq!(holder.balances_count, 2);

    let system = repo
        .get_scope_state(&ScopeKey::System { system: addr(9) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(system.count, 2);
    assert_eq!(system.launched_count, 1);
    assert_eq!(system.total_value_in_base_currency, d("2375"));

    let token_types = repo.list_token_type_scopes(&addr(9)).await.unwrap();
    assert_eq!(token_types.len(), 2);
    let sum = token_types
        .iter()
        .fold(Decimal::zero(), |acc, s| acc + s.percentage_of_total_supply.clone());
    assert!((&sum - &Decimal::hundred()).abs() < d("0.000000000001"));

    // In-memory and persisted state agree.
    for state in all_states(&repo).await {
        assert_eq!(aggregator.scope(&state.key), Some(&state));
    }
}

#[tokio::test]
async fn test_resumed_replay_matches_single_pass() {
    let temp_dir = TempDir::new().unwrap();

    // Single pass.
    let single = setup_repo(&temp_dir, "single.db").await;
    let replayer = Replayer::new(
        Arc::new(MockEventSource::new().with_events(scenario())),
        single.clone(),
        3,
    );
    let mut aggregator = Aggregator::new();
    replayer.replay_incremental(&mut aggregator).await.unwrap();

    // Two runs with a restart in between.
    let resumed = setup_repo(&temp_dir, "resumed.db").await;
    let events = scenario();
    let first_half = Replayer::new(
        Arc::new(MockEventSource::new().with_events(events[..4].to_vec())),
        resumed.clone(),
        3,
    );
    let mut aggregator = resumed.load_aggregator().await.unwrap();
    first_half.replay_incremental(&mut aggregator).await.unwrap();
    assert_eq!(
        resumed.get_watermark().await.unwrap(),
        Some(EventId::new(4, 0, 0))
    );

    let full = Replayer::new(
        Arc::new(MockEventSource::new().with_events(events)),
        resumed.clone(),
        3,
    );
    let mut aggregator = resumed.load_aggregator().await.unwrap();
    let result = full.replay_incremental(&mut aggregator).await.unwrap();
    assert_eq!(result.events_applied, 5);

    assert_eq!(all_states(&single).await, all_states(&resumed).await);
    assert_eq!(
        single.events_applied().await.unwrap(),
        resumed.events_applied().await.unwrap()
    );

    let key = ScopeKey::Account { account: addr(0xa) };
    assert_eq!(
        single.query_timeseries(&key, None, None).await.unwrap(),
        resumed.query_timeseries(&key, None, None).await.unwrap()
    );
}

#[tokio::test]
async fn test_rerun_with_no_new_events_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let repo = setup_repo(&temp_dir, "rerun.db").await;
    let replayer = Replayer::new(
        Arc::new(MockEventSource::new().with_events(scenario())),
        repo.clone(),
        4,
    );
    let mut aggregator = Aggregator::new();
    replayer.replay_incremental(&mut aggregator).await.unwrap();
    let before = all_states(&repo).await;

    let mut reloaded = repo.load_aggregator().await.unwrap();
    let result = replayer.replay_incremental(&mut reloaded).await.unwrap();
    assert_eq!(result.events_applied, 0);
    assert_eq!(all_states(&repo).await, before);
}

#[tokio::test]
async fn test_replay_from_jsonl_file() {
    let temp_dir = TempDir::new().unwrap();
    let repo = setup_repo(&temp_dir, "jsonl.db").await;

    let events_path = temp_dir.path().join("events.jsonl");
    let mut file = std::fs::File::create(&events_path).unwrap();
    for event in scenario().iter().rev() {
        writeln!(file, "{}", serde_json::to_string(event).unwrap()).unwrap();
        writeln!(file).unwrap();
    }
    drop(file);

    let replayer = Replayer::new(
        Arc::new(JsonlEventSource::new(&events_path)),
        repo.clone(),
        500,
    );
    let mut aggregator = Aggregator::new();
    let result = replayer.replay_incremental(&mut aggregator).await.unwrap();
    assert_eq!(result.events_applied, 9);
    assert_eq!(result.watermark, Some(EventId::new(9, 0, 0)));

    let bond_supply = repo
        .get_scope_state(&ScopeKey::Token { token: addr(3) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bond_supply.total_value_exact, ExactAmount::from(9));
}
