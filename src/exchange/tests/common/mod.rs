//! Shared setup for exchange integration tests

#![allow(dead_code)]

use std::sync::Arc;
use summoner_core::{Address, IdentityId, ResourceId};
use summoner_exchange::{Exchange, ExchangeConfig};
use summoner_ledger::{InMemoryIdentityRegistry, InMemoryLedger};

pub const OPERATOR: &str = "0xexchange";
pub const ONE: u128 = 1_000_000_000_000_000_000;

pub struct World {
    pub registry: Arc<InMemoryIdentityRegistry>,
    pub gold: Arc<InMemoryLedger>,
    pub material: Arc<InMemoryLedger>,
    pub exchange: Arc<Exchange>,
}

impl World {
    pub fn new(min_tier: u32) -> Self {
        let registry = Arc::new(InMemoryIdentityRegistry::new());
        let gold = Arc::new(InMemoryLedger::new("0xgold"));
        let material = Arc::new(InMemoryLedger::new("0xmaterial"));

        let exchange = Exchange::new(
            ExchangeConfig::new(OPERATOR, "0xrarity", min_tier, "0xgold"),
            registry.clone(),
            gold.clone(),
        )
        .expect("valid config")
        .with_resource(material.clone())
        .expect("material registers");

        Self {
            registry,
            gold,
            material,
            exchange: Arc::new(exchange),
        }
    }

    /// Summon a level-`level` summoner for a fresh account funded on both ledgers
    pub fn player(&self, name: &str, level: u32, gold: u128, material: u128) -> (Address, IdentityId) {
        let addr = Address::new(name);
        let id = self.registry.summon(&addr, 1);
        self.registry.set_level(id, level).unwrap();
        if gold > 0 {
            self.gold.mint(&addr, gold).unwrap();
        }
        if material > 0 {
            self.material.mint(&addr, material).unwrap();
        }
        (addr, id)
    }

    pub fn operator(&self) -> Address {
        Address::new(OPERATOR)
    }

    pub fn material_id(&self) -> ResourceId {
        ResourceId::new("0xmaterial")
    }
}
