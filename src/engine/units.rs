use std::collections::VecDeque;

use crate::catalog::UnitCatalog;
use crate::constants::{ARRIVAL_EPSILON, SLOW_FIELD_MULTIPLIER, SLOW_FIELD_RANGE};
use crate::map::GameMap;
use crate::pathfinding::find_path;
use crate::types::{Ability, PlayerSlot, UnitType, UnitView, Vec2};

#[derive(Clone, Debug)]
pub struct Unit {
    pub id: String,
    pub unit_type: UnitType,
    pub owner: PlayerSlot,
    pub position: Vec2,
    pub hp: i32,
    pub max_hp: i32,
    /// Final destination of the current move order.
    pub target: Vec2,
    /// Waypoints still ahead, ending at `target`. Empty once arrived.
    pub route: VecDeque<Vec2>,
    pub attack_cooldown: f32,
    pub ability_cooldown: f32,
    pub first_strike: bool,
    pub last_hit_by: Option<String>,
}

impl Unit {
    pub fn spawn(
        id: String,
        unit_type: UnitType,
        owner: PlayerSlot,
        position: Vec2,
        catalog: &UnitCatalog,
    ) -> Self {
        let stats = catalog.get(unit_type);
        Self {
            id,
            unit_type,
            owner,
            position,
            hp: stats.hp,
            max_hp: stats.hp,
            target: position,
            route: VecDeque::new(),
            attack_cooldown: 0.0,
            ability_cooldown: 0.0,
            first_strike: stats.ability == Some(Ability::FirstStrike),
            last_hit_by: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn view(&self) -> UnitView {
        UnitView {
            id: self.id.clone(),
            unit_type: self.unit_type,
            owner: self.owner,
            x: self.position.x,
            y: self.position.y,
            hp: self.hp,
            max_hp: self.max_hp,
            target_x: self.target.x,
            target_y: self.target.y,
        }
    }
}

/// Waypoints from `from` to `target` over the map grid. The last waypoint is
/// the exact target; without a grid route the unit heads straight for it.
pub fn plan_route(map: &GameMap, from: Vec2, target: Vec2) -> VecDeque<Vec2> {
    let path = find_path(map.walkable(), map.cell_of(from), map.cell_of(target));
    let mut route: VecDeque<Vec2> = match path {
        Some(result) => result
            .path
            .iter()
            .skip(1)
            .map(|cell| Vec2::new(cell.x as f32, cell.y as f32))
            .collect(),
        None => VecDeque::new(),
    };
    route.pop_back();
    route.push_back(target);
    route
}

/// Moves every unit toward its next waypoint at `speed * dt`, snapping onto
/// a waypoint once within reach.
pub fn integrate_movement(units: &mut [Unit], catalog: &UnitCatalog, dt_sec: f32) {
    let slow_fields: Vec<(PlayerSlot, Vec2)> = units
        .iter()
        .filter(|unit| catalog.get(unit.unit_type).ability == Some(Ability::SlowField))
        .map(|unit| (unit.owner, unit.position))
        .collect();

    for unit in units.iter_mut() {
        let slowed = slow_fields.iter().any(|(owner, center)| {
            *owner != unit.owner && center.distance(unit.position) <= SLOW_FIELD_RANGE
        });
        let mut budget = catalog.get(unit.unit_type).speed * dt_sec;
        if slowed {
            budget *= SLOW_FIELD_MULTIPLIER;
        }

        while let Some(&waypoint) = unit.route.front() {
            let dist = unit.position.distance(waypoint);
            if dist <= ARRIVAL_EPSILON {
                unit.position = waypoint;
                unit.route.pop_front();
                continue;
            }
            if budget <= 0.0 {
                break;
            }
            if dist <= budget {
                unit.position = waypoint;
                unit.route.pop_front();
                budget -= dist;
                continue;
            }
            let dx = (waypoint.x - unit.position.x) / dist;
            let dy = (waypoint.y - unit.position.y) / dist;
            unit.position = Vec2::new(unit.position.x + dx * budget, unit.position.y + dy * budget);
            break;
        }
    }
}

/// Removes dead units in one pass and returns them.
pub fn purge_dead(units: &mut Vec<Unit>) -> Vec<Unit> {
    let (alive, dead): (Vec<Unit>, Vec<Unit>) = units.drain(..).partition(Unit::is_alive);
    *units = alive;
    dead
}

pub fn count_owned(units: &[Unit], owner: PlayerSlot) -> usize {
    units.iter().filter(|unit| unit.owner == owner).count()
}
