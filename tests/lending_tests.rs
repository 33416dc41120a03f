use clearlend::lending::{parse_amount, Amount, LendingService, UserPosition};
use clearlend::LendingError;
use serde_json::json;

fn units(n: u64) -> Amount {
    Amount::from(n)
}

#[test]
fn test_alice_usdc_walkthrough() {
    let mut lending = LendingService::new();

    let receipt = lending.supply("alice", "USDC", 100u64).unwrap();
    assert_eq!(receipt.position, UserPosition::new(100u64, 0u64));
    assert_eq!(receipt.market.total_supply, units(100));

    let receipt = lending.borrow("alice", "USDC", 100u64).unwrap();
    assert_eq!(receipt.position, UserPosition::new(100u64, 100u64));
    assert_eq!(receipt.market.total_borrow, units(100));

    assert!(matches!(
        lending.borrow("alice", "USDC", 1u64),
        Err(LendingError::InsufficientCollateral { .. })
    ));
    assert_eq!(lending.position("alice", "USDC"), UserPosition::new(100u64, 100u64));

    let repay = lending.repay("alice", "USDC", 150u64).unwrap();
    assert_eq!(repay.repaid, units(100));
    assert_eq!(repay.receipt.position, UserPosition::new(100u64, 0u64));
    assert_eq!(repay.receipt.market.total_borrow, units(0));

    let receipt = lending.redeem("alice", "USDC", 100u64).unwrap();
    assert_eq!(receipt.position, UserPosition::new(0u64, 0u64));
    assert_eq!(receipt.market.total_supply, units(0));
}

#[test]
fn test_borrow_above_supplied_always_fails() {
    let mut lending = LendingService::new();
    lending.supply("bob", "ETH", 10u64).unwrap();

    assert!(matches!(
        lending.borrow("bob", "ETH", 11u64),
        Err(LendingError::InsufficientCollateral { requested, .. }) if requested == units(11)
    ));
    lending.borrow("bob", "ETH", 4u64).unwrap();
    assert!(matches!(
        lending.borrow("bob", "ETH", 11u64),
        Err(LendingError::InsufficientCollateral { .. })
    ));
    // Never supplied anything in this asset
    assert_eq!(
        lending.borrow("bob", "DAI", 1u64),
        Err(LendingError::InsufficientCollateral {
            available: units(0),
            requested: units(1),
        })
    );
}

#[test]
fn test_repay_without_debt_repays_nothing() {
    let mut lending = LendingService::new();
    lending.supply("erin", "USDC", 50u64).unwrap();

    let repay = lending.repay("erin", "USDC", 20u64).unwrap();
    assert_eq!(repay.repaid, units(0));
    assert_eq!(repay.receipt.position, UserPosition::new(50u64, 0u64));
}

#[test]
fn test_partial_repay() {
    let mut lending = LendingService::new();
    lending.supply("frank", "USDC", 80u64).unwrap();
    lending.borrow("frank", "USDC", 30u64).unwrap();

    let repay = lending.repay("frank", "USDC", 10u64).unwrap();
    assert_eq!(repay.repaid, units(10));
    assert_eq!(lending.position("frank", "USDC"), UserPosition::new(80u64, 20u64));
    assert_eq!(lending.market("USDC").unwrap().total_borrow, units(20));
}

#[test]
fn test_redeem_bounded_by_available() {
    let mut lending = LendingService::new();
    lending.supply("gina", "DAI", 100u64).unwrap();
    lending.borrow("gina", "DAI", 30u64).unwrap();

    assert_eq!(
        lending.redeem("gina", "DAI", 71u64),
        Err(LendingError::InsufficientAvailableBalance {
            available: units(70),
            requested: units(71),
        })
    );
    lending.redeem("gina", "DAI", 70u64).unwrap();
    assert_eq!(lending.position("gina", "DAI"), UserPosition::new(30u64, 30u64));
    assert_eq!(lending.market("DAI").unwrap().total_supply, units(30));
}

#[test]
fn test_markets_aggregate_across_users() {
    let mut lending = LendingService::new();
    lending.supply("alice", "USDC", 100u64).unwrap();
    lending.supply("bob", "USDC", 40u64).unwrap();
    lending.borrow("bob", "USDC", 25u64).unwrap();
    lending.supply("bob", "ETH", 2u64).unwrap();

    let usdc = lending.market("USDC").unwrap();
    assert_eq!(usdc.total_supply, units(140));
    assert_eq!(usdc.total_borrow, units(25));

    let mut holders: Vec<_> = lending
        .positions_for_symbol("USDC")
        .map(|(user, position)| (user.to_string(), position.clone()))
        .collect();
    holders.sort();
    assert_eq!(
        holders,
        vec![
            ("alice".to_string(), UserPosition::new(100u64, 0u64)),
            ("bob".to_string(), UserPosition::new(40u64, 25u64)),
        ]
    );
}

#[test]
fn test_state_json_uses_decimal_strings() {
    let mut lending = LendingService::new();
    lending.supply("alice", "USDC", 100u64).unwrap();
    lending.borrow("alice", "USDC", 40u64).unwrap();

    let state = serde_json::to_value(lending.state()).unwrap();
    assert_eq!(
        state,
        json!({
            "markets": [{
                "symbol": "USDC",
                "totalSupply": "100",
                "totalBorrow": "40",
                "reserves": "0",
                "interestRateBps": 500
            }]
        })
    );

    let repay = serde_json::to_value(lending.repay("alice", "USDC", 100u64).unwrap()).unwrap();
    assert_eq!(repay["repaid"], "40");
    assert_eq!(repay["user"], "alice");
    assert_eq!(repay["position"], json!({ "supplied": "100", "borrowed": "0" }));
}

#[test]
fn test_string_amounts() {
    let mut lending = LendingService::new();
    let amount = parse_amount("250").unwrap();
    lending.supply("hank", "USDC", amount).unwrap();

    assert!(matches!(
        parse_amount("2.5").and_then(|amount| lending.supply("hank", "USDC", amount)),
        Err(LendingError::InvalidAmount(_))
    ));
    assert!(matches!(
        parse_amount("0").and_then(|amount| lending.supply("hank", "USDC", amount)),
        Err(LendingError::InvalidAmount(_))
    ));
    assert_eq!(lending.position("hank", "USDC").supplied, units(250));

    let whale = parse_amount("123456789012345678901234567890123456789012345678901234567890").unwrap();
    lending.supply("hank", "USDC", whale).unwrap();
    assert_eq!(
        serde_json::to_value(lending.position("hank", "USDC")).unwrap()["supplied"],
        "123456789012345678901234567890123456789012345678901234568140"
    );
}

#[tokio::test]
async fn test_shared_ledger_serializes_writers() {
    let lending = LendingService::new().into_shared();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let lending = lending.clone();
            tokio::spawn(async move {
                let user = format!("user{}", i % 4);
                let mut ledger = lending.lock().await;
                ledger.supply(&user, "USDC", 10u64).unwrap();
                ledger.borrow(&user, "USDC", 5u64).unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let ledger = lending.lock().await;
    let market = ledger.market("USDC").unwrap();
    assert_eq!(market.total_supply, units(160));
    assert_eq!(market.total_borrow, units(80));
    assert_eq!(ledger.position("user0", "USDC"), UserPosition::new(40u64, 20u64));
}
