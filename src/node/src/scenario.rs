//! Scenario replay against in-memory collaborators
//!
//! A scenario file summons identities, funds ledgers, sets allowances and
//! then drives the exchange through an ordered list of steps. Every step
//! result and every emitted event is written as one JSON line.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use summoner_core::{Address, Amount, IdentityId, ResourceId};
use summoner_exchange::{Exchange, ExchangeConfig, ExchangeEvent, Trade};
use summoner_ledger::{InMemoryIdentityRegistry, InMemoryLedger};
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    #[serde(default)]
    pub summoners: Vec<SummonerSpec>,
    #[serde(default)]
    pub ledgers: Vec<LedgerSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SummonerSpec {
    pub owner: Address,
    #[serde(default)]
    pub class: u32,
    #[serde(default = "default_level")]
    pub level: u32,
    /// Operators granted control over every summoner of `owner`
    #[serde(default)]
    pub operators: Vec<Address>,
}

fn default_level() -> u32 { 1 }

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerSpec {
    pub id: ResourceId,
    #[serde(default)]
    pub balances: BTreeMap<String, AmountValue>,
    /// Allowances granted to the exchange operator
    #[serde(default)]
    pub allowances: BTreeMap<String, AmountValue>,
}

/// Amount given as an integer or a decimal string
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AmountValue(#[serde(with = "summoner_core::types::amount")] pub Amount);

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Submit {
        caller: Address,
        resource: ResourceId,
        #[serde(with = "summoner_core::types::amount")]
        price: Amount,
        #[serde(with = "summoner_core::types::amount")]
        amount: Amount,
        identity: IdentityId,
    },
    Buy {
        caller: Address,
        resource: ResourceId,
        offeror: Address,
        identity: IdentityId,
    },
    Cancel {
        caller: Address,
        resource: ResourceId,
    },
    /// Retry the gold release of a quarantined trade
    Settle {
        trade_id: u64,
    },
    Inspect {
        resource: ResourceId,
        offeror: Address,
    },
    Approve {
        ledger: ResourceId,
        owner: Address,
        #[serde(with = "summoner_core::types::amount")]
        amount: Amount,
    },
    Count,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Submit { .. } => "submit",
            Step::Buy { .. } => "buy",
            Step::Cancel { .. } => "cancel",
            Step::Settle { .. } => "settle",
            Step::Inspect { .. } => "inspect",
            Step::Approve { .. } => "approve",
            Step::Count => "count",
        }
    }
}

/// Summary of a replay
#[derive(Debug, Default)]
pub struct Outcome {
    pub steps_run: usize,
    pub failures: Vec<(usize, String)>,
    pub events: usize,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read scenario file {}", path.as_ref().display())
        })?;
        toml::from_str(&contents).context("Failed to parse scenario file")
    }
}

/// In-memory world a scenario runs in
struct World {
    exchange: Exchange,
    ledgers: HashMap<ResourceId, Arc<InMemoryLedger>>,
}

fn build_world(config: &ExchangeConfig, scenario: &Scenario) -> Result<World> {
    let registry = Arc::new(InMemoryIdentityRegistry::new());
    for spec in &scenario.summoners {
        let id = registry.summon(&spec.owner, spec.class);
        registry.set_level(id, spec.level)?;
        for operator in &spec.operators {
            registry.set_approval_for_all(&spec.owner, operator, true);
        }
    }

    let mut ledgers = HashMap::new();
    for spec in &scenario.ledgers {
        let ledger = Arc::new(InMemoryLedger::new(spec.id.clone()));
        for (owner, amount) in &spec.balances {
            ledger.mint(&Address::new(owner.as_str()), amount.0)?;
        }
        for (owner, amount) in &spec.allowances {
            ledger.approve(&Address::new(owner.as_str()), &config.operator, amount.0);
        }
        if ledgers.insert(spec.id.clone(), ledger).is_some() {
            anyhow::bail!("Ledger {} declared twice", spec.id);
        }
    }
    let gold = ledgers
        .entry(config.gold.clone())
        .or_insert_with(|| Arc::new(InMemoryLedger::new(config.gold.clone())))
        .clone();

    let mut exchange = Exchange::new(config.clone(), registry, gold)
        .context("Failed to deploy exchange")?;
    for (id, ledger) in &ledgers {
        if id != &config.gold {
            exchange.register_resource(ledger.clone())?;
        }
    }

    Ok(World { exchange, ledgers })
}

async fn run_step(world: &World, step: &Step) -> Result<serde_json::Value> {
    let trade_json = |trade: Trade| serde_json::to_value(trade).map_err(anyhow::Error::from);
    match step {
        Step::Submit {
            caller,
            resource,
            price,
            amount,
            identity,
        } => {
            let trade = world
                .exchange
                .submit_trade(caller, resource, *price, *amount, *identity)
                .await?;
            trade_json(trade)
        }
        Step::Buy {
            caller,
            resource,
            offeror,
            identity,
        } => {
            let trade = world
                .exchange
                .buy_trade(caller, resource, offeror, *identity)
                .await?;
            trade_json(trade)
        }
        Step::Cancel { caller, resource } => {
            let trade = world.exchange.cancel_trade(caller, resource).await?;
            trade_json(trade)
        }
        Step::Settle { trade_id } => {
            let trade = world.exchange.complete_settlement(*trade_id).await?;
            trade_json(trade)
        }
        Step::Inspect { resource, offeror } => {
            let trade = world
                .exchange
                .get_trade_information(resource, offeror)
                .await?;
            trade_json(trade)
        }
        Step::Approve {
            ledger,
            owner,
            amount,
        } => {
            let target = world
                .ledgers
                .get(ledger)
                .with_context(|| format!("Unknown ledger {}", ledger))?;
            target.approve(owner, &world.exchange.config().operator, *amount);
            Ok(json!({ "ledger": ledger, "owner": owner, "allowance": amount.to_string() }))
        }
        Step::Count => Ok(json!({ "trades": world.exchange.trades().await })),
    }
}

fn drain_events<W: Write>(
    rx: &mut broadcast::Receiver<ExchangeEvent>,
    out: &mut W,
    outcome: &mut Outcome,
) -> Result<()> {
    loop {
        match rx.try_recv() {
            Ok(event) => {
                writeln!(out, "{}", json!({ "event": event }))?;
                outcome.events += 1;
            }
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                warn!(skipped = n, "event stream lagged");
            }
            Err(_) => return Ok(()),
        }
    }
}

/// Replay `scenario`, writing JSON lines to `out`. Stops at the first
/// failed step unless `keep_going` is set.
pub async fn run<W: Write>(
    config: &ExchangeConfig,
    scenario: &Scenario,
    keep_going: bool,
    out: &mut W,
) -> Result<Outcome> {
    let world = build_world(config, scenario)?;
    let mut rx = world.exchange.subscribe();
    let mut outcome = Outcome::default();

    info!(steps = scenario.steps.len(), "replaying scenario");

    for (idx, step) in scenario.steps.iter().enumerate() {
        let number = idx + 1;
        outcome.steps_run += 1;

        match run_step(&world, step).await {
            Ok(result) => {
                writeln!(
                    out,
                    "{}",
                    json!({ "step": number, "action": step.name(), "ok": true, "result": result })
                )?;
            }
            Err(e) => {
                warn!(step = number, action = step.name(), error = %e, "step failed");
                writeln!(
                    out,
                    "{}",
                    json!({ "step": number, "action": step.name(), "ok": false, "error": e.to_string() })
                )?;
                outcome.failures.push((number, e.to_string()));
            }
        }
        drain_events(&mut rx, out, &mut outcome)?;

        if !outcome.failures.is_empty() && !keep_going {
            break;
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RARITY_SCENARIO: &str = r#"
        [[summoners]]
        owner = "gold-owner"

        [[summoners]]
        owner = "material-owner"

        [[ledgers]]
        id = "0xgold"
        balances = { "gold-owner" = "100000000000000000000" }
        allowances = { "gold-owner" = "10000000000000000000" }

        [[ledgers]]
        id = "0xmaterial"
        balances = { "material-owner" = "100000000000000000000" }
        allowances = { "material-owner" = "10000000000000000000" }

        [[steps]]
        action = "submit"
        caller = "material-owner"
        resource = "0xmaterial"
        price = "10000000000000000000"
        amount = "10000000000000000000"
        identity = 1

        [[steps]]
        action = "count"

        [[steps]]
        action = "buy"
        caller = "gold-owner"
        resource = "0xmaterial"
        offeror = "material-owner"
        identity = 0

        [[steps]]
        action = "buy"
        caller = "gold-owner"
        resource = "0xmaterial"
        offeror = "material-owner"
        identity = 0

        [[steps]]
        action = "inspect"
        resource = "0xmaterial"
        offeror = "material-owner"
    "#;

    fn config() -> ExchangeConfig {
        ExchangeConfig::new("0xexchange", "0xrarity", 1, "0xgold")
    }

    fn lines(out: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8(out.to_vec())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_replay_stops_at_double_fill() {
        let scenario: Scenario = toml::from_str(RARITY_SCENARIO).unwrap();
        let mut out = Vec::new();

        let outcome = run(&config(), &scenario, false, &mut out).await.unwrap();
        assert_eq!(outcome.steps_run, 4);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, 4);
        assert_eq!(outcome.events, 2);

        let lines = lines(&out);
        assert_eq!(lines[0]["result"]["trade_id"], 1);
        assert_eq!(lines[1]["event"]["type"], "trade_opened");
        assert_eq!(lines[2]["result"]["trades"], 1);
        assert_eq!(lines[3]["result"]["fulfilled"], true);
        assert_eq!(lines[4]["event"]["type"], "trade_filled");
        assert_eq!(lines[5]["ok"], false);
    }

    #[tokio::test]
    async fn test_keep_going_runs_every_step() {
        let scenario: Scenario = toml::from_str(RARITY_SCENARIO).unwrap();
        let mut out = Vec::new();

        let outcome = run(&config(), &scenario, true, &mut out).await.unwrap();
        assert_eq!(outcome.steps_run, 5);
        assert_eq!(outcome.failures.len(), 1);

        let last = lines(&out).pop().unwrap();
        assert_eq!(last["action"], "inspect");
        assert_eq!(last["result"]["fulfilled"], true);
    }

    #[tokio::test]
    async fn test_settle_on_healthy_trade_fails() {
        let mut scenario: Scenario = toml::from_str(RARITY_SCENARIO).unwrap();
        scenario.steps.truncate(1);
        scenario.steps.push(Step::Settle { trade_id: 1 });
        let mut out = Vec::new();

        let outcome = run(&config(), &scenario, true, &mut out).await.unwrap();
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, 2);
        assert!(outcome.failures[0].1.contains("not awaiting settlement"));
    }

    #[tokio::test]
    async fn test_duplicate_ledger_rejected() {
        let scenario: Scenario = toml::from_str(
            r#"
            [[ledgers]]
            id = "0xmaterial"
            [[ledgers]]
            id = "0xmaterial"
            "#,
        )
        .unwrap();
        let mut out = Vec::new();
        assert!(run(&config(), &scenario, false, &mut out).await.is_err());
    }
}
