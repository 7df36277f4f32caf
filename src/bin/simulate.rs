use clap::Parser;
use craft_war_server::config::GameConfig;
use craft_war_server::constants::TICK_MS;
use craft_war_server::engine::GameSession;
use craft_war_server::snapshot::Snapshot;
use craft_war_server::types::{
    Command, GameOverReason, NodeOwner, PlayerSlot, RuntimeEvent, UnitType,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const PRODUCE_EVERY_TICKS: u64 = 20;
const ORDER_EVERY_TICKS: u64 = 60;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs scripted bot matches headless")]
struct Cli {
    #[arg(long)]
    seed: Option<u64>,
    /// Round length in minutes, overriding the balance config.
    #[arg(long)]
    minutes: Option<u32>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct Scenario {
    name: String,
    seed: u32,
    p1_build: Vec<UnitType>,
    p2_build: Vec<UnitType>,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    reason: Option<GameOverReason>,
    winner: Option<PlayerSlot>,
    #[serde(rename = "durationSec")]
    duration_sec: f32,
    #[serde(rename = "p1Nodes")]
    p1_nodes: usize,
    #[serde(rename = "p2Nodes")]
    p2_nodes: usize,
    #[serde(rename = "unitsProduced")]
    units_produced: usize,
    #[serde(rename = "unitDeaths")]
    unit_deaths: usize,
    #[serde(rename = "nodesCaptured")]
    nodes_captured: usize,
    #[serde(rename = "nodesNeutralized")]
    nodes_neutralized: usize,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct ScenarioRunResult {
    result: ScenarioResultLine,
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationSec")]
    average_duration_sec: f32,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

/// Produces along a fixed build order and marches idle units onto the
/// closest node it does not own yet.
struct ScriptedBot {
    client_id: String,
    slot: PlayerSlot,
    build_order: Vec<UnitType>,
    next_build: usize,
}

impl ScriptedBot {
    fn new(client_id: &str, slot: PlayerSlot, build_order: Vec<UnitType>) -> Self {
        Self {
            client_id: client_id.to_string(),
            slot,
            build_order,
            next_build: 0,
        }
    }

    fn act(&mut self, session: &GameSession) -> Vec<Command> {
        let mut commands = Vec::new();
        let tick = session.tick();

        if tick % PRODUCE_EVERY_TICKS == 0 && !self.build_order.is_empty() {
            let unit_type = self.build_order[self.next_build % self.build_order.len()];
            let cost = session.config().units.get(unit_type).cost;
            let affordable = session
                .player(self.slot)
                .map(|player| player.resources.covers(&cost))
                .unwrap_or(false);
            if affordable {
                commands.push(Command::ProduceUnit { unit_type });
                self.next_build += 1;
            }
        }

        if tick % ORDER_EVERY_TICKS == 0 {
            let idle: Vec<String> = session
                .units()
                .iter()
                .filter(|unit| unit.owner == self.slot && unit.route.is_empty())
                .map(|unit| unit.id.clone())
                .collect();
            if let Some(node_id) = self.pick_target(session) {
                if !idle.is_empty() {
                    commands.push(Command::CaptureNode {
                        unit_ids: idle,
                        node_id,
                    });
                }
            }
        }
        commands
    }

    fn pick_target(&self, session: &GameSession) -> Option<String> {
        let map = session.map();
        let home = map.base_of(self.slot)?.position();
        map.nodes
            .iter()
            .filter(|node| !node.is_base() && node.owner != NodeOwner::from(self.slot))
            .min_by(|a, b| {
                home.distance(a.position())
                    .total_cmp(&home.distance(b.position()))
            })
            .map(|node| node.id.clone())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("simulate=info,craft_war_server=warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match GameConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "config rejected");
            return ExitCode::from(2);
        }
    };
    if let Some(minutes) = cli.minutes {
        config.round_duration_sec = minutes.clamp(1, 15) as f32 * 60.0;
    }
    let config = Arc::new(config);

    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        info!(
            match_id = %match_id,
            scenario = %scenario.name,
            seed = scenario.seed,
            "scenario started"
        );
        let scenario_run = match run_scenario(config.clone(), &scenario) {
            Ok(run) => run,
            Err(err) => {
                error!(%err, "session could not be created");
                return ExitCode::from(2);
            }
        };

        for anomaly in &scenario_run.anomaly_records {
            warn!(
                match_id = %match_id,
                scenario = %scenario.name,
                tick = anomaly.tick,
                message = %anomaly.message,
                "anomaly detected"
            );
        }
        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        *reason_counts
            .entry(reason_key(scenario_run.result.reason))
            .or_insert(0) += 1;

        info!(
            match_id = %match_id,
            scenario = %scenario.name,
            tick = scenario_run.finished_tick,
            winner = scenario_run.result.winner.map(PlayerSlot::as_str).unwrap_or("none"),
            duration_sec = scenario_run.result.duration_sec,
            "scenario finished"
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(err) => error!(%err, "scenario result did not serialize"),
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        scenario_results,
        reason_counts,
        total_anomalies,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(err) = write_summary(path, &summary) {
            error!(path = %path.display(), %err, "summary write failed");
            return ExitCode::from(2);
        }
    }

    info!(
        match_id = %match_id,
        scenario_count = summary.scenario_count,
        anomaly_count = summary.anomaly_count,
        average_duration_sec = summary.average_duration_sec,
        "run finished"
    );

    if has_anomaly {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_scenario(
    config: Arc<GameConfig>,
    scenario: &Scenario,
) -> Result<ScenarioRunResult, craft_war_server::error::ConfigError> {
    let max_ticks = (config.round_duration_sec * config.tick_rate as f32).ceil() as u64 + 1;
    let mut session = GameSession::new(config, scenario.seed)?;
    let mut bots = vec![
        ScriptedBot::new("bot_1", PlayerSlot::Player1, scenario.p1_build.clone()),
        ScriptedBot::new("bot_2", PlayerSlot::Player2, scenario.p2_build.clone()),
    ];
    for bot in &bots {
        session.join(&bot.client_id);
    }
    session.drain_events();

    let mut units_produced = 0;
    let mut unit_deaths = 0;
    let mut nodes_captured = 0;
    let mut nodes_neutralized = 0;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();

    while !session.is_finished() {
        for bot in bots.iter_mut() {
            for command in bot.act(&session) {
                session.enqueue(&bot.client_id, command);
            }
        }
        if let Err(err) = session.step(TICK_MS) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                session.tick(),
                err.to_string(),
            );
            break;
        }

        let snapshot = session.build_snapshot();
        for message in collect_snapshot_anomalies(&snapshot, session.config()) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        if snapshot.tick > max_ticks {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }

        for event in session.drain_events() {
            match event {
                RuntimeEvent::UnitProduced { .. } => units_produced += 1,
                RuntimeEvent::UnitDeath { .. } => unit_deaths += 1,
                RuntimeEvent::NodeCaptured { .. } => nodes_captured += 1,
                RuntimeEvent::NodeNeutralized { .. } => nodes_neutralized += 1,
                _ => {}
            }
        }
    }

    let result = session.result().cloned();
    Ok(ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            reason: result.as_ref().map(|result| result.reason),
            winner: result.as_ref().and_then(|result| result.winner_id),
            duration_sec: result
                .as_ref()
                .map(|result| result.duration_sec)
                .unwrap_or(0.0),
            p1_nodes: session.map().captured_count(PlayerSlot::Player1),
            p2_nodes: session.map().captured_count(PlayerSlot::Player2),
            units_produced,
            unit_deaths,
            nodes_captured,
            nodes_neutralized,
            anomalies,
        },
        anomaly_records,
        finished_tick: session.tick(),
    })
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, config: &GameConfig) -> Vec<String> {
    let mut anomalies = Vec::new();
    for player in &snapshot.players {
        if player
            .resources
            .iter()
            .any(|value| !value.is_finite() || value < 0.0 || value > config.resource_cap)
        {
            anomalies.push(format!(
                "resources out of range: {}",
                player.id.as_str()
            ));
        }
        if player.unit_count > config.max_units_per_player {
            anomalies.push(format!("unit cap exceeded: {}", player.id.as_str()));
        }
    }
    for unit in &snapshot.units {
        if unit.hp <= 0 {
            anomalies.push(format!("unit hp <= 0 remains: {}", unit.id));
        }
    }
    for node in &snapshot.nodes {
        if !(0.0..=100.0).contains(&node.capture_progress) {
            anomalies.push(format!("capture progress out of range: {}", node.id));
        }
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(now_ms));
    vec![
        Scenario {
            name: "mirror-tier1".to_string(),
            seed,
            p1_build: vec![UnitType::HtmlSoldier, UnitType::CssGuardian, UnitType::JsStriker],
            p2_build: vec![UnitType::HtmlSoldier, UnitType::CssGuardian, UnitType::JsStriker],
        },
        Scenario {
            name: "counter-check".to_string(),
            seed: normalize_seed(seed as u64 + 1),
            p1_build: vec![UnitType::HtmlSoldier, UnitType::HtmlKnight],
            p2_build: vec![UnitType::JsStriker, UnitType::JsAssassin],
        },
        Scenario {
            name: "support-mix".to_string(),
            seed: normalize_seed(seed as u64 + 2),
            p1_build: vec![UnitType::HtmlSoldier, UnitType::CssMage, UnitType::ApiConnector],
            p2_build: vec![UnitType::JsStriker, UnitType::Firewall, UnitType::DebugDrone],
        },
    ]
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    reason_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_duration_sec = if scenario_count == 0 {
        0.0
    } else {
        scenarios.iter().map(|line| line.duration_sec).sum::<f32>() / scenario_count as f32
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_duration_sec,
        reason_counts,
        scenarios,
    }
}

fn reason_key(reason: Option<GameOverReason>) -> String {
    match reason {
        Some(GameOverReason::OpponentLeft) => "opponent_left",
        Some(GameOverReason::TimeUp) => "time_up",
        Some(GameOverReason::Domination) => "domination",
        None => "halted",
    }
    .to_string()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}
