//! A fill either moves both legs or nothing

mod common;

use async_trait::async_trait;
use common::World;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use summoner_core::{
    Address, Amount, EscrowHold, IdentityId, LedgerError, ResourceId, ResourceLedger,
};
use summoner_exchange::{
    Exchange, ExchangeConfig, ExchangeError, ExchangeEvent, SettlementSide, Trade,
};
use summoner_ledger::{InMemoryIdentityRegistry, InMemoryLedger};

#[tokio::test]
async fn test_buyer_without_allowance_changes_nothing() {
    let world = World::new(1);
    let (buyer, buyer_id) = world.player("buyer", 1, 100, 0);
    let (seller, seller_id) = world.player("seller", 1, 0, 100);
    let material = world.material_id();

    world.material.approve(&seller, &world.operator(), 10);
    world.gold.approve(&buyer, &world.operator(), 9);
    world
        .exchange
        .submit_trade(&seller, &material, 10, 10, seller_id)
        .await
        .unwrap();

    let err = world
        .exchange
        .buy_trade(&buyer, &material, &seller, buyer_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::InsufficientAllowanceOrBalance {
            side: SettlementSide::Buyer,
            source: LedgerError::InsufficientAllowance { have: 9, need: 10 },
        }
    ));

    assert_eq!(world.gold.balance_of(&buyer).await.unwrap(), 100);
    assert_eq!(world.gold.balance_of(&seller).await.unwrap(), 0);
    assert_eq!(world.material.balance_of(&seller).await.unwrap(), 100);
    assert_eq!(world.material.balance_of(&buyer).await.unwrap(), 0);
    assert!(!world
        .exchange
        .get_trade_information(&material, &seller)
        .await
        .unwrap()
        .fulfilled);
    assert_eq!(world.exchange.events().len(), 1);
}

#[tokio::test]
async fn test_offeror_spent_balance_after_submit() {
    let world = World::new(1);
    let (buyer, buyer_id) = world.player("buyer", 1, 100, 0);
    let (seller, seller_id) = world.player("seller", 1, 0, 10);
    let material = world.material_id();

    world.material.approve(&seller, &world.operator(), 10);
    world.gold.approve(&buyer, &world.operator(), 10);
    world
        .exchange
        .submit_trade(&seller, &material, 10, 10, seller_id)
        .await
        .unwrap();

    // Seller moves the material away before anyone fills
    world
        .material
        .transfer(&seller, &Address::new("elsewhere"), 5)
        .unwrap();

    let err = world
        .exchange
        .buy_trade(&buyer, &material, &seller, buyer_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::InsufficientAllowanceOrBalance {
            side: SettlementSide::Offeror,
            source: LedgerError::InsufficientBalance { have: 5, need: 10 },
        }
    ));
    assert_eq!(world.gold.balance_of(&buyer).await.unwrap(), 100);
    assert_eq!(
        world.gold.allowance(&buyer, &world.operator()).await.unwrap(),
        10
    );
    assert_eq!(world.gold.pending_holds(), 0);
    assert_eq!(world.material.pending_holds(), 0);

    // Retry succeeds once the seller tops back up
    world.material.mint(&seller, 5).unwrap();
    let filled = world
        .exchange
        .buy_trade(&buyer, &material, &seller, buyer_id)
        .await
        .unwrap();
    assert!(filled.fulfilled);
}

/// Ledger whose escrow works but whose release can be switched off. A
/// failing release touches nothing, exactly like a real ledger rejecting
/// the credit.
struct FlakyLedger {
    inner: InMemoryLedger,
    fail_release: AtomicBool,
}

impl FlakyLedger {
    fn new(id: &str) -> Self {
        Self {
            inner: InMemoryLedger::new(id),
            fail_release: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail_release.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceLedger for FlakyLedger {
    fn resource_id(&self) -> &ResourceId {
        self.inner.resource_id()
    }

    async fn balance_of(&self, owner: &Address) -> summoner_core::Result<Amount> {
        self.inner.balance_of(owner).await
    }

    async fn allowance(&self, owner: &Address, spender: &Address) -> summoner_core::Result<Amount> {
        self.inner.allowance(owner, spender).await
    }

    async fn escrow_from(
        &self,
        spender: &Address,
        from: &Address,
        amount: Amount,
    ) -> Result<EscrowHold, LedgerError> {
        self.inner.escrow_from(spender, from, amount).await
    }

    async fn release(&self, hold: &EscrowHold, to: &Address) -> Result<(), LedgerError> {
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(LedgerError::Overflow(to.to_string()));
        }
        self.inner.release(hold, to).await
    }

    async fn refund(&self, hold: EscrowHold) -> Result<(), LedgerError> {
        self.inner.refund(hold).await
    }
}

struct FlakyMarket {
    gold: Arc<FlakyLedger>,
    material: Arc<FlakyLedger>,
    exchange: Exchange,
    operator: Address,
    buyer: Address,
    buyer_id: IdentityId,
    seller: Address,
    resource: ResourceId,
}

/// Buyer holds 10 gold, seller 10 material, both fully approved, and the
/// seller has an open 10-for-10 trade
async fn flaky_market() -> FlakyMarket {
    let registry = Arc::new(InMemoryIdentityRegistry::new());
    let gold = Arc::new(FlakyLedger::new("gold"));
    let material = Arc::new(FlakyLedger::new("material"));
    let operator = Address::new("exchange");

    let buyer = Address::new("buyer");
    let seller = Address::new("seller");
    let buyer_id = registry.summon(&buyer, 1);
    let seller_id = registry.summon(&seller, 1);
    gold.inner.mint(&buyer, 10).unwrap();
    gold.inner.approve(&buyer, &operator, 10);
    material.inner.mint(&seller, 10).unwrap();
    material.inner.approve(&seller, &operator, 10);

    let exchange = Exchange::new(
        ExchangeConfig::new("exchange", "rarity", 1, "gold"),
        registry,
        gold.clone(),
    )
    .unwrap()
    .with_resource(material.clone())
    .unwrap();

    let resource = ResourceId::new("material");
    exchange
        .submit_trade(&seller, &resource, 10, 10, seller_id)
        .await
        .unwrap();

    FlakyMarket {
        gold,
        material,
        exchange,
        operator,
        buyer,
        buyer_id,
        seller,
        resource,
    }
}

impl FlakyMarket {
    async fn buy(&self) -> Result<Trade, ExchangeError> {
        self.exchange
            .buy_trade(&self.buyer, &self.resource, &self.seller, self.buyer_id)
            .await
    }

    /// (buyer gold, seller gold, buyer material, seller material)
    async fn balances(&self) -> (Amount, Amount, Amount, Amount) {
        (
            self.gold.balance_of(&self.buyer).await.unwrap(),
            self.gold.balance_of(&self.seller).await.unwrap(),
            self.material.balance_of(&self.buyer).await.unwrap(),
            self.material.balance_of(&self.seller).await.unwrap(),
        )
    }

    /// (buyer gold allowance, seller material allowance)
    async fn allowances(&self) -> (Amount, Amount) {
        (
            self.gold.allowance(&self.buyer, &self.operator).await.unwrap(),
            self.material.allowance(&self.seller, &self.operator).await.unwrap(),
        )
    }
}

#[tokio::test]
async fn test_resource_release_failure_refunds_both_legs() {
    let market = flaky_market().await;
    market.material.set_failing(true);

    // Repeated attempts never charge the buyer
    for _ in 0..2 {
        let err = market.buy().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Ledger(LedgerError::Overflow(_))));

        assert_eq!(market.balances().await, (10, 0, 0, 10));
        assert_eq!(market.allowances().await, (10, 10));
        assert_eq!(market.gold.inner.pending_holds(), 0);
        assert_eq!(market.material.inner.pending_holds(), 0);
        assert!(market.exchange.trade_by_id(1).await.unwrap().is_active());
    }
    assert_eq!(market.exchange.events().len(), 1);

    market.material.set_failing(false);
    assert!(market.buy().await.unwrap().fulfilled);
    assert_eq!(market.balances().await, (0, 10, 10, 0));
}

#[tokio::test]
async fn test_gold_release_failure_quarantines_trade() {
    let market = flaky_market().await;
    market.gold.set_failing(true);

    let err = market.buy().await.unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::SettlementIncomplete { trade_id: 1, .. }
    ));

    // Material was delivered; the buyer's gold waits in a parked hold
    assert_eq!(market.balances().await, (0, 0, 10, 0));
    assert_eq!(market.allowances().await, (0, 0));
    assert_eq!(market.gold.inner.pending_holds(), 1);
    assert_eq!(market.material.inner.pending_holds(), 0);

    let trade = market.exchange.trade_by_id(1).await.unwrap();
    assert!(trade.quarantined);
    assert!(!trade.fulfilled);
    assert!(!trade.is_active());
    assert_eq!(trade.buyer, Some(market.buyer.clone()));

    // The trade cannot take gold a second time, nor be withdrawn
    assert!(matches!(
        market.buy().await,
        Err(ExchangeError::TradeQuarantined { trade_id: 1 })
    ));
    assert!(matches!(
        market
            .exchange
            .cancel_trade(&market.seller, &market.resource)
            .await,
        Err(ExchangeError::TradeQuarantined { trade_id: 1 })
    ));
    assert_eq!(market.balances().await, (0, 0, 10, 0));
    assert!(market
        .exchange
        .active_trades(&market.resource)
        .await
        .is_empty());
    assert!(matches!(
        market.exchange.events().last(),
        Some(ExchangeEvent::TradeQuarantined { trade_id: 1, .. })
    ));

    // Retrying while the ledger still fails keeps the hold parked
    assert!(matches!(
        market.exchange.complete_settlement(1).await,
        Err(ExchangeError::SettlementIncomplete { trade_id: 1, .. })
    ));
    assert_eq!(market.gold.inner.pending_holds(), 1);

    market.gold.set_failing(false);
    let settled = market.exchange.complete_settlement(1).await.unwrap();
    assert!(settled.fulfilled);
    assert!(!settled.quarantined);
    assert_eq!(market.balances().await, (0, 10, 10, 0));
    assert_eq!(market.gold.inner.pending_holds(), 0);
    assert!(matches!(
        market.exchange.events().last(),
        Some(ExchangeEvent::TradeFilled { trade_id: 1, .. })
    ));

    assert!(matches!(
        market.exchange.complete_settlement(1).await,
        Err(ExchangeError::TradeNotQuarantined { trade_id: 1 })
    ));
}
