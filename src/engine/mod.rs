use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::GameConfig;
use crate::constants::{CAPTURE_PROGRESS_MAX, MAX_PLAYERS, SNAPSHOT_VERSION, SPAWN_JITTER};
use crate::error::{ConfigError, SessionError, SessionResult};
use crate::map::GameMap;
use crate::rng::Rng;
use crate::snapshot::Snapshot;
use crate::types::{
    Command, GameOverReason, GameResult, Phase, PlayerSlot, PlayerView, Resources, RuntimeEvent,
    UnitType,
};

pub mod combat;
pub mod economy;
pub mod territory;
pub mod units;

use self::combat::{resolve_combat, CombatRules};
use self::units::{count_owned, integrate_movement, plan_route, purge_dead, Unit};

#[derive(Clone, Debug)]
pub struct Player {
    pub slot: PlayerSlot,
    pub client_id: String,
    pub resources: Resources,
    pub unit_count: usize,
}

impl Player {
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.slot,
            resources: self.resources,
            unit_count: self.unit_count,
        }
    }
}

/// One match. The owner feeds it lifecycle calls and queued commands, and
/// advances it with [`GameSession::step`] at the configured tick rate.
#[derive(Clone, Debug)]
pub struct GameSession {
    config: Arc<GameConfig>,
    combat_rules: CombatRules,
    map: GameMap,
    rng: Rng,
    players: Vec<Player>,
    units: Vec<Unit>,
    pending: VecDeque<(String, Command)>,
    events: Vec<RuntimeEvent>,
    phase: Phase,
    round_time_left_ms: u64,
    elapsed_ms: u64,
    tick_counter: u64,
    next_unit_id: u64,
    result: Option<GameResult>,
}

impl GameSession {
    pub fn new(config: Arc<GameConfig>, seed: u32) -> Result<Self, ConfigError> {
        config.validate()?;
        let round_time_left_ms = (config.round_duration_sec * 1000.0).round() as u64;
        Ok(Self {
            combat_rules: CombatRules::from_config(&config),
            map: GameMap::new(&config.blocked_cells),
            rng: Rng::new(seed),
            players: Vec::new(),
            units: Vec::new(),
            pending: VecDeque::new(),
            events: Vec::new(),
            phase: Phase::Waiting,
            round_time_left_ms,
            elapsed_ms: 0,
            tick_counter: 0,
            next_unit_id: 1,
            result: None,
            config,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn tick(&self) -> u64 {
        self.tick_counter
    }

    pub fn round_time(&self) -> f32 {
        self.round_time_left_ms as f32 / 1000.0
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&Player> {
        self.players.iter().find(|player| player.slot == slot)
    }

    pub fn slot_of(&self, client_id: &str) -> Option<PlayerSlot> {
        self.players
            .iter()
            .find(|player| player.client_id == client_id)
            .map(|player| player.slot)
    }

    /// Seats `client_id` in the lowest free slot. The second seat starts the
    /// match.
    pub fn join(&mut self, client_id: &str) -> Option<PlayerSlot> {
        if self.phase != Phase::Waiting {
            debug!(client_id, phase = ?self.phase, "join rejected: match already started");
            return None;
        }
        if self.slot_of(client_id).is_some() {
            debug!(client_id, "join rejected: already seated");
            return None;
        }
        if self.players.len() >= MAX_PLAYERS {
            debug!(client_id, "join rejected: session full");
            return None;
        }
        let slot = PlayerSlot::ALL
            .into_iter()
            .find(|slot| self.player(*slot).is_none())?;

        self.players.push(Player {
            slot,
            client_id: client_id.to_string(),
            resources: self.config.starting_resources,
            unit_count: 0,
        });
        self.players.sort_by_key(|player| player.slot);
        info!(client_id, slot = slot.as_str(), "player joined");

        if self.players.len() == MAX_PLAYERS {
            self.phase = Phase::Playing;
            self.events.push(RuntimeEvent::GameStart);
            info!("match started");
        }
        Some(slot)
    }

    /// Removes the client and its units. Leaving mid-match hands the win to
    /// the remaining player.
    pub fn leave(&mut self, client_id: &str) -> Option<PlayerSlot> {
        let slot = self.slot_of(client_id)?;
        self.players.retain(|player| player.slot != slot);
        self.units.retain(|unit| unit.owner != slot);
        self.pending.retain(|(queued_by, _)| queued_by != client_id);
        info!(client_id, slot = slot.as_str(), "player left");

        if self.phase == Phase::Playing {
            let remaining = slot.opponent();
            self.finish(Some(remaining), Some(slot), GameOverReason::OpponentLeft);
        }
        Some(slot)
    }

    /// Queues a command for the next tick boundary. Returns `false` when the
    /// command cannot be accepted at all.
    pub fn enqueue(&mut self, client_id: &str, command: Command) -> bool {
        if self.phase != Phase::Playing || self.slot_of(client_id).is_none() {
            debug!(client_id, ?command, "command dropped outside of play");
            return false;
        }
        self.pending.push_back((client_id.to_string(), command));
        true
    }

    pub fn step(&mut self, dt_ms: u64) -> SessionResult<()> {
        if self.phase != Phase::Playing {
            self.pending.clear();
            return Ok(());
        }
        self.tick_counter += 1;

        while let Some((client_id, command)) = self.pending.pop_front() {
            match self.slot_of(&client_id) {
                Some(slot) => self.apply_command(slot, command),
                None => debug!(client_id = %client_id, "command from departed client ignored"),
            }
        }

        let dt_sec = dt_ms as f32 / 1000.0;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        self.round_time_left_ms = self.round_time_left_ms.saturating_sub(dt_ms);
        if self.round_time_left_ms == 0 {
            self.finish_on_timeout();
            return self.check_invariants();
        }

        self.update_economy(dt_sec);
        integrate_movement(&mut self.units, &self.config.units, dt_sec);
        resolve_combat(
            &mut self.units,
            &self.config.units,
            &self.combat_rules,
            dt_sec,
        );
        self.remove_dead_units();

        let capture_events = territory::update_capture(
            &mut self.map,
            &self.units,
            self.config.capture_radius,
            dt_sec,
        );
        for event in &capture_events {
            if let RuntimeEvent::NodeCaptured { node_id, new_owner } = event {
                info!(node_id = %node_id, owner = new_owner.as_str(), "node captured");
            }
        }
        self.events.extend(capture_events);

        if let Some(slot) = territory::dominating_player(&self.map) {
            self.finish(Some(slot), Some(slot.opponent()), GameOverReason::Domination);
        }

        self.check_invariants()
    }

    pub fn apply_command(&mut self, slot: PlayerSlot, command: Command) {
        match command {
            Command::ProduceUnit { unit_type } => {
                self.produce(slot, unit_type);
            }
            Command::MoveUnits {
                unit_ids,
                target_x,
                target_y,
            } => {
                self.move_units(slot, &unit_ids, target_x, target_y);
            }
            Command::Attack {
                unit_ids,
                target_id,
            } => {
                let target = self
                    .units
                    .iter()
                    .find(|unit| unit.id == target_id && unit.owner != slot)
                    .map(|unit| unit.position);
                match target {
                    Some(position) => {
                        self.move_units(slot, &unit_ids, position.x, position.y);
                    }
                    None => debug!(
                        slot = slot.as_str(),
                        target_id = %target_id,
                        "attack rejected: no such enemy"
                    ),
                }
            }
            Command::CaptureNode { unit_ids, node_id } => {
                let target = self
                    .map
                    .nodes
                    .iter()
                    .find(|node| node.id == node_id)
                    .map(|node| node.position());
                match target {
                    Some(position) => {
                        self.move_units(slot, &unit_ids, position.x, position.y);
                    }
                    None => debug!(
                        slot = slot.as_str(),
                        node_id = %node_id,
                        "capture rejected: unknown node"
                    ),
                }
            }
        }
    }

    /// Spawns one unit at the player's base. Returns the new unit id, or
    /// `None` when the cap or the player's resources forbid it.
    pub fn produce(&mut self, slot: PlayerSlot, unit_type: UnitType) -> Option<String> {
        if self.phase != Phase::Playing {
            return None;
        }
        let max_units = self.config.max_units_per_player;
        let cost = self.config.units.get(unit_type).cost;
        let player_idx = self.players.iter().position(|player| player.slot == slot)?;

        if self.players[player_idx].unit_count >= max_units {
            debug!(
                slot = slot.as_str(),
                unit_type = unit_type.as_str(),
                "produce rejected: unit cap"
            );
            return None;
        }
        let Some(remaining) = economy::spend(self.players[player_idx].resources, &cost) else {
            debug!(
                slot = slot.as_str(),
                unit_type = unit_type.as_str(),
                "produce rejected: insufficient resources"
            );
            return None;
        };
        let base = self.map.base_of(slot)?.position();

        let jitter_x = self.rng.jitter(SPAWN_JITTER);
        let jitter_y = self.rng.jitter(SPAWN_JITTER);
        let position = self.map.clamp_point(base.x + jitter_x, base.y + jitter_y);
        let id = self.make_unit_id();
        self.units.push(Unit::spawn(
            id.clone(),
            unit_type,
            slot,
            position,
            &self.config.units,
        ));

        let player = &mut self.players[player_idx];
        player.resources = remaining;
        player.unit_count += 1;
        self.events.push(RuntimeEvent::UnitProduced {
            unit_id: id.clone(),
            owner: slot,
            unit_type,
        });
        Some(id)
    }

    /// Routes the listed units owned by `slot` toward the clamped target.
    /// Returns how many units took the order.
    pub fn move_units(
        &mut self,
        slot: PlayerSlot,
        unit_ids: &[String],
        target_x: f32,
        target_y: f32,
    ) -> usize {
        if self.phase != Phase::Playing {
            return 0;
        }
        if !target_x.is_finite() || !target_y.is_finite() {
            debug!(slot = slot.as_str(), "move rejected: non-finite target");
            return 0;
        }
        let target = self.map.clamp_point(target_x, target_y);
        let mut moved = 0;
        for unit in self
            .units
            .iter_mut()
            .filter(|unit| unit.owner == slot && unit_ids.contains(&unit.id))
        {
            unit.target = target;
            unit.route = plan_route(&self.map, unit.position, target);
            moved += 1;
        }
        moved
    }

    pub fn build_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            tick: self.tick_counter,
            round_time: self.round_time(),
            phase: self.phase,
            players: self.players.iter().map(Player::view).collect(),
            units: self.units.iter().map(Unit::view).collect(),
            nodes: self.map.nodes.iter().map(|node| node.view()).collect(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<RuntimeEvent> {
        std::mem::take(&mut self.events)
    }

    fn update_economy(&mut self, dt_sec: f32) {
        for idx in 0..self.players.len() {
            let slot = self.players[idx].slot;
            let captured = self.map.captured_count(slot);
            let mut resources = economy::apply_production(
                &self.config,
                self.players[idx].resources,
                captured,
                dt_sec,
            );
            if self.config.upkeep_enabled {
                let upkeep = economy::total_upkeep(
                    &self.config.units,
                    self.units
                        .iter()
                        .filter(|unit| unit.owner == slot)
                        .map(|unit| unit.unit_type),
                );
                resources = economy::apply_upkeep(resources, upkeep, dt_sec);
            }
            self.players[idx].resources = resources;
        }
    }

    fn remove_dead_units(&mut self) {
        for dead in purge_dead(&mut self.units) {
            self.events.push(RuntimeEvent::UnitDeath {
                unit_id: dead.id,
                owner: dead.owner,
                killer_unit_id: dead.last_hit_by,
                x: dead.position.x,
                y: dead.position.y,
            });
        }
        for player in &mut self.players {
            player.unit_count = count_owned(&self.units, player.slot);
        }
    }

    fn finish_on_timeout(&mut self) {
        let (winner, loser) = territory::decide_timeout(
            self.map.captured_count(PlayerSlot::Player1),
            self.map.captured_count(PlayerSlot::Player2),
            self.config.tie_break,
        );
        self.finish(winner, loser, GameOverReason::TimeUp);
    }

    fn finish(
        &mut self,
        winner_id: Option<PlayerSlot>,
        loser_id: Option<PlayerSlot>,
        reason: GameOverReason,
    ) {
        if self.phase == Phase::Finished {
            return;
        }
        let result = GameResult {
            winner_id,
            loser_id,
            reason,
            p1_nodes: self.map.captured_count(PlayerSlot::Player1),
            p2_nodes: self.map.captured_count(PlayerSlot::Player2),
            duration_sec: self.elapsed_ms as f32 / 1000.0,
        };
        info!(
            winner = winner_id.map(PlayerSlot::as_str).unwrap_or("none"),
            reason = ?reason,
            p1_nodes = result.p1_nodes,
            p2_nodes = result.p2_nodes,
            "match finished"
        );
        self.phase = Phase::Finished;
        self.pending.clear();
        self.events.push(RuntimeEvent::GameResult {
            result: result.clone(),
        });
        self.result = Some(result);
    }

    /// Verifies the state the tick left behind. A violation halts the
    /// session for good.
    pub fn check_invariants(&mut self) -> SessionResult<()> {
        match self.find_violation() {
            None => Ok(()),
            Some(message) => {
                error!(tick = self.tick_counter, %message, "session halted");
                self.phase = Phase::Finished;
                self.pending.clear();
                Err(SessionError::Invariant(message))
            }
        }
    }

    fn find_violation(&self) -> Option<String> {
        if self.players.len() > MAX_PLAYERS {
            return Some(format!("{} players seated", self.players.len()));
        }
        for player in &self.players {
            let in_bounds = player
                .resources
                .iter()
                .all(|value| {
                    value.is_finite() && (0.0..=self.config.resource_cap).contains(&value)
                });
            if !in_bounds {
                return Some(format!(
                    "{} resources out of bounds: {:?}",
                    player.slot.as_str(),
                    player.resources
                ));
            }
            if player.unit_count > self.config.max_units_per_player {
                return Some(format!(
                    "{} fields {} units",
                    player.slot.as_str(),
                    player.unit_count
                ));
            }
        }
        if let Some(unit) = self
            .units
            .iter()
            .find(|unit| unit.hp < 0 || unit.hp > unit.max_hp)
        {
            return Some(format!("unit {} has hp {}", unit.id, unit.hp));
        }
        if let Some(node) = self
            .map
            .nodes
            .iter()
            .find(|node| !(0.0..=CAPTURE_PROGRESS_MAX).contains(&node.capture_progress))
        {
            return Some(format!(
                "node {} progress {}",
                node.id, node.capture_progress
            ));
        }
        None
    }

    fn make_unit_id(&mut self) -> String {
        let id = format!("u{}", self.next_unit_id);
        self.next_unit_id = self.next_unit_id.saturating_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::constants::TICK_MS;
    use crate::types::{NodeOwner, TieBreak, Vec2};

    fn make_session(config: GameConfig) -> GameSession {
        GameSession::new(Arc::new(config), 424_242).expect("valid config")
    }

    fn started_session(config: GameConfig) -> GameSession {
        let mut session = make_session(config);
        assert_eq!(session.join("alice"), Some(PlayerSlot::Player1));
        assert_eq!(session.join("bob"), Some(PlayerSlot::Player2));
        session
    }

    fn run_ticks(session: &mut GameSession, ticks: usize) {
        for _ in 0..ticks {
            session.step(TICK_MS).expect("tick keeps invariants");
        }
    }

    fn spawn_at(
        session: &mut GameSession,
        slot: PlayerSlot,
        unit_type: UnitType,
        position: Vec2,
    ) -> String {
        let id = session.make_unit_id();
        let unit = Unit::spawn(id.clone(), unit_type, slot, position, &session.config.units);
        session.units.push(unit);
        if let Some(player) = session.players.iter_mut().find(|player| player.slot == slot) {
            player.unit_count += 1;
        }
        id
    }

    fn resources_of(session: &GameSession, slot: PlayerSlot) -> Resources {
        session.player(slot).expect("seated").resources
    }

    #[test]
    fn second_join_starts_the_match() {
        let mut session = make_session(GameConfig::default());
        assert_eq!(session.join("alice"), Some(PlayerSlot::Player1));
        assert_eq!(session.phase(), Phase::Waiting);
        assert_eq!(session.join("alice"), None);
        assert_eq!(session.join("bob"), Some(PlayerSlot::Player2));
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.join("carol"), None);
        assert_eq!(session.drain_events(), vec![RuntimeEvent::GameStart]);
        assert_eq!(
            resources_of(&session, PlayerSlot::Player2),
            Resources::new(100.0, 80.0, 60.0)
        );
    }

    #[test]
    fn rejoin_after_leaving_a_waiting_room_takes_the_free_slot() {
        let mut waiting = make_session(GameConfig::default());
        waiting.join("alice");
        assert_eq!(waiting.leave("alice"), Some(PlayerSlot::Player1));
        assert_eq!(waiting.join("carol"), Some(PlayerSlot::Player1));
        assert_eq!(waiting.phase(), Phase::Waiting);
    }

    #[test]
    fn waiting_session_does_not_advance() {
        let mut session = make_session(GameConfig::default());
        session.join("alice");
        run_ticks(&mut session, 100);
        assert_eq!(session.tick(), 0);
        assert_eq!(session.round_time(), 900.0);
        assert_eq!(
            resources_of(&session, PlayerSlot::Player1),
            Resources::new(100.0, 80.0, 60.0)
        );
    }

    #[test]
    fn base_income_accrues_over_ten_seconds() {
        let mut session = started_session(GameConfig::default());
        run_ticks(&mut session, 200);
        let resources = resources_of(&session, PlayerSlot::Player1);
        assert!((resources.html - 120.0).abs() < 1e-2);
        assert!((resources.css - 95.0).abs() < 1e-2);
        assert!((resources.js - 70.0).abs() < 1e-2);
        assert!((session.round_time() - 890.0).abs() < 1e-3);
    }

    #[test]
    fn leaving_mid_match_forfeits() {
        let mut session = started_session(GameConfig::default());
        session.produce(PlayerSlot::Player1, UnitType::HtmlSoldier);
        session.drain_events();

        assert_eq!(session.leave("alice"), Some(PlayerSlot::Player1));
        assert_eq!(session.phase(), Phase::Finished);
        assert!(session.units().is_empty());
        let result = session.result().expect("result recorded");
        assert_eq!(result.winner_id, Some(PlayerSlot::Player2));
        assert_eq!(result.loser_id, Some(PlayerSlot::Player1));
        assert_eq!(result.reason, GameOverReason::OpponentLeft);
        assert!(matches!(
            session.drain_events().as_slice(),
            [RuntimeEvent::GameResult { .. }]
        ));

        let tick = session.tick();
        run_ticks(&mut session, 10);
        assert_eq!(session.tick(), tick);
    }

    #[test]
    fn producing_deducts_the_exact_cost() {
        let mut session = started_session(GameConfig::default());
        let id = session
            .produce(PlayerSlot::Player1, UnitType::HtmlSoldier)
            .expect("affordable");
        assert_eq!(id, "u1");
        assert_eq!(
            resources_of(&session, PlayerSlot::Player1),
            Resources::new(70.0, 80.0, 60.0)
        );

        let unit = &session.units()[0];
        let base = session
            .map()
            .base_of(PlayerSlot::Player1)
            .expect("base")
            .position();
        assert!((unit.position.x - base.x).abs() <= 0.5);
        assert!((unit.position.y - base.y).abs() <= 0.5);
        assert_eq!(unit.target, unit.position);
        assert_eq!(session.player(PlayerSlot::Player1).map(|p| p.unit_count), Some(1));
    }

    #[test]
    fn spending_down_to_zero_is_allowed() {
        let mut session = started_session(GameConfig::default());
        session.players[0].resources = Resources::new(30.0, 0.0, 0.0);
        assert!(session
            .produce(PlayerSlot::Player1, UnitType::HtmlSoldier)
            .is_some());
        assert_eq!(resources_of(&session, PlayerSlot::Player1), Resources::ZERO);
    }

    #[test]
    fn unaffordable_production_changes_nothing() {
        let mut session = started_session(GameConfig::default());
        assert!(session
            .produce(PlayerSlot::Player1, UnitType::JsOverlord)
            .is_none());
        assert!(session.units().is_empty());
        assert_eq!(session.player(PlayerSlot::Player1).expect("seated").unit_count, 0);
        assert_eq!(
            resources_of(&session, PlayerSlot::Player1),
            Resources::new(100.0, 80.0, 60.0)
        );
        assert!(session.drain_events().iter().all(|event| !matches!(
            event,
            RuntimeEvent::UnitProduced { .. }
        )));
    }

    #[test]
    fn unit_cap_blocks_production() {
        let mut session = started_session(GameConfig {
            max_units_per_player: 2,
            ..GameConfig::default()
        });
        assert!(session.produce(PlayerSlot::Player1, UnitType::HtmlSoldier).is_some());
        assert!(session.produce(PlayerSlot::Player1, UnitType::HtmlSoldier).is_some());
        let before = resources_of(&session, PlayerSlot::Player1);
        assert!(session.produce(PlayerSlot::Player1, UnitType::HtmlSoldier).is_none());
        assert_eq!(resources_of(&session, PlayerSlot::Player1), before);
        assert_eq!(session.units().len(), 2);
    }

    #[test]
    fn commands_apply_at_the_next_tick() {
        let mut session = started_session(GameConfig::default());
        assert!(session.enqueue(
            "alice",
            Command::ProduceUnit {
                unit_type: UnitType::HtmlSoldier,
            }
        ));
        assert!(!session.enqueue(
            "mallory",
            Command::ProduceUnit {
                unit_type: UnitType::HtmlSoldier,
            }
        ));
        assert!(session.units().is_empty());
        session.step(TICK_MS).expect("tick");
        assert_eq!(session.units().len(), 1);
        assert_eq!(session.units()[0].owner, PlayerSlot::Player1);
    }

    #[test]
    fn move_ignores_foreign_and_unknown_units() {
        let mut session = started_session(GameConfig::default());
        let mine = session
            .produce(PlayerSlot::Player1, UnitType::HtmlSoldier)
            .expect("affordable");
        let theirs = session
            .produce(PlayerSlot::Player2, UnitType::HtmlSoldier)
            .expect("affordable");

        let moved = session.move_units(
            PlayerSlot::Player1,
            &[mine.clone(), theirs.clone(), "u999".to_string()],
            5.0,
            3.0,
        );
        assert_eq!(moved, 1);
        let target = |id: &str| {
            session
                .units()
                .iter()
                .find(|unit| unit.id == id)
                .map(|unit| unit.target)
        };
        assert_eq!(target(&mine), Some(Vec2::new(5.0, 3.0)));
        assert_ne!(target(&theirs), Some(Vec2::new(5.0, 3.0)));
    }

    #[test]
    fn move_clamps_targets_and_rejects_non_finite_ones() {
        let mut session = started_session(GameConfig::default());
        let id = session
            .produce(PlayerSlot::Player1, UnitType::HtmlSoldier)
            .expect("affordable");
        assert_eq!(
            session.move_units(PlayerSlot::Player1, &[id.clone()], f32::NAN, 3.0),
            0
        );
        assert_eq!(
            session.move_units(PlayerSlot::Player1, &[id.clone()], -10.0, 99.0),
            1
        );
        assert_eq!(session.units()[0].target, Vec2::new(0.0, 14.0));
        assert_eq!(session.units()[0].route.back(), Some(&Vec2::new(0.0, 14.0)));
    }

    #[test]
    fn attack_and_capture_orders_resolve_to_positions() {
        let mut session = started_session(GameConfig::default());
        let mine = session
            .produce(PlayerSlot::Player1, UnitType::HtmlSoldier)
            .expect("affordable");
        let enemy = spawn_at(
            &mut session,
            PlayerSlot::Player2,
            UnitType::JsStriker,
            Vec2::new(9.0, 4.0),
        );

        session.apply_command(
            PlayerSlot::Player1,
            Command::CaptureNode {
                unit_ids: vec![mine.clone()],
                node_id: "boss".to_string(),
            },
        );
        assert_eq!(session.units()[0].target, Vec2::new(10.0, 7.0));

        session.apply_command(
            PlayerSlot::Player1,
            Command::Attack {
                unit_ids: vec![mine.clone()],
                target_id: enemy,
            },
        );
        assert_eq!(session.units()[0].target, Vec2::new(9.0, 4.0));

        session.apply_command(
            PlayerSlot::Player1,
            Command::Attack {
                unit_ids: vec![mine.clone()],
                target_id: mine,
            },
        );
        assert_eq!(session.units()[0].target, Vec2::new(9.0, 4.0));
    }

    #[test]
    fn timeout_awards_the_node_leader() {
        let mut session = started_session(GameConfig {
            round_duration_sec: 1.0,
            ..GameConfig::default()
        });
        session.map.nodes[4].owner = NodeOwner::Player2;
        run_ticks(&mut session, 20);
        let result = session.result().expect("round over");
        assert_eq!(result.reason, GameOverReason::TimeUp);
        assert_eq!(result.winner_id, Some(PlayerSlot::Player2));
        assert_eq!(result.p2_nodes, 1);
        assert!((result.duration_sec - 1.0).abs() < 1e-6);
        assert_eq!(session.round_time(), 0.0);
    }

    #[test]
    fn timeout_tie_respects_configured_tie_break() {
        let mut first = started_session(GameConfig {
            round_duration_sec: 1.0,
            ..GameConfig::default()
        });
        run_ticks(&mut first, 20);
        assert_eq!(
            first.result().and_then(|result| result.winner_id),
            Some(PlayerSlot::Player1)
        );

        let mut draw = started_session(GameConfig {
            round_duration_sec: 1.0,
            tie_break: TieBreak::Draw,
            ..GameConfig::default()
        });
        run_ticks(&mut draw, 20);
        let result = draw.result().expect("round over");
        assert_eq!(result.winner_id, None);
        assert_eq!(result.loser_id, None);
    }

    #[test]
    fn marching_onto_a_node_captures_it() {
        let mut session = started_session(GameConfig {
            upkeep_enabled: false,
            ..GameConfig::default()
        });
        let id = session
            .produce(PlayerSlot::Player1, UnitType::JsStriker)
            .expect("affordable");
        session.move_units(PlayerSlot::Player1, &[id], 5.0, 3.0);
        session.drain_events();

        run_ticks(&mut session, 20 * 20);
        let n1 = session
            .map()
            .nodes
            .iter()
            .find(|node| node.id == "n1")
            .expect("n1");
        assert_eq!(n1.owner, NodeOwner::Player1);
        assert_eq!(session.map().captured_count(PlayerSlot::Player1), 1);
        assert!(session.drain_events().contains(&RuntimeEvent::NodeCaptured {
            node_id: "n1".to_string(),
            new_owner: PlayerSlot::Player1,
        }));
    }

    #[test]
    fn holding_every_node_ends_the_match() {
        let mut session = started_session(GameConfig::default());
        for node in session.map.nodes.iter_mut().filter(|node| !node.is_base()) {
            node.owner = NodeOwner::Player1;
            node.capture_progress = CAPTURE_PROGRESS_MAX;
        }
        run_ticks(&mut session, 1);
        let result = session.result().expect("domination");
        assert_eq!(result.reason, GameOverReason::Domination);
        assert_eq!(result.winner_id, Some(PlayerSlot::Player1));
        assert_eq!(result.p1_nodes, 7);
    }

    #[test]
    fn combat_kills_are_purged_with_events() {
        let mut session = started_session(GameConfig {
            upkeep_enabled: false,
            ..GameConfig::default()
        });
        let attacker = spawn_at(
            &mut session,
            PlayerSlot::Player1,
            UnitType::JsOverlord,
            Vec2::new(10.0, 2.0),
        );
        let victim = spawn_at(
            &mut session,
            PlayerSlot::Player2,
            UnitType::JsStriker,
            Vec2::new(11.0, 2.0),
        );
        session.drain_events();

        run_ticks(&mut session, 20 * 5);
        assert!(session.units().iter().all(|unit| unit.id != victim));
        assert_eq!(session.player(PlayerSlot::Player2).map(|p| p.unit_count), Some(0));
        let deaths: Vec<RuntimeEvent> = session
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, RuntimeEvent::UnitDeath { .. }))
            .collect();
        assert_eq!(deaths.len(), 1);
        match &deaths[0] {
            RuntimeEvent::UnitDeath {
                unit_id,
                killer_unit_id,
                ..
            } => {
                assert_eq!(unit_id, &victim);
                assert_eq!(killer_unit_id.as_deref(), Some(attacker.as_str()));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn upkeep_drains_resources_when_enabled() {
        let mut session = started_session(GameConfig {
            base_production: Resources::ZERO,
            ..GameConfig::default()
        });
        spawn_at(&mut session, PlayerSlot::Player1, UnitType::HtmlTitan, Vec2::new(1.0, 1.0));
        run_ticks(&mut session, 20);
        let resources = resources_of(&session, PlayerSlot::Player1);
        // 1.2 per second split over three resources
        assert!((resources.html - 99.6).abs() < 1e-3);
        assert!((resources.js - 59.6).abs() < 1e-3);
    }

    #[test]
    fn corrupted_state_halts_the_session() {
        let mut session = started_session(GameConfig::default());
        spawn_at(&mut session, PlayerSlot::Player1, UnitType::HtmlSoldier, Vec2::new(1.0, 1.0));
        session.units[0].hp = 500;
        let err = session.step(TICK_MS).expect_err("hp above max");
        assert!(matches!(err, SessionError::Invariant(_)));
        assert!(session.is_finished());
    }

    #[test]
    fn same_seed_produces_same_progression() {
        let script = |session: &mut GameSession| {
            for tick in 0..400u32 {
                if tick % 40 == 0 {
                    session.enqueue(
                        "alice",
                        Command::ProduceUnit {
                            unit_type: UnitType::HtmlSoldier,
                        },
                    );
                    session.enqueue(
                        "bob",
                        Command::ProduceUnit {
                            unit_type: UnitType::CssGuardian,
                        },
                    );
                }
                if tick % 60 == 30 {
                    let ids: Vec<String> =
                        session.units().iter().map(|unit| unit.id.clone()).collect();
                    session.enqueue(
                        "alice",
                        Command::MoveUnits {
                            unit_ids: ids.clone(),
                            target_x: 10.0,
                            target_y: 7.0,
                        },
                    );
                    session.enqueue(
                        "bob",
                        Command::MoveUnits {
                            unit_ids: ids,
                            target_x: 10.0,
                            target_y: 7.0,
                        },
                    );
                }
                session.step(TICK_MS).expect("tick");
            }
        };

        let mut a = started_session(GameConfig::default());
        let mut b = started_session(GameConfig::default());
        script(&mut a);
        script(&mut b);

        let sa = a.build_snapshot();
        let sb = b.build_snapshot();
        assert_eq!(sa, sb);
        assert!(!sa.units.is_empty());
    }
}
