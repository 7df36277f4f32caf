//! Node capture progress and end-of-round decisions.
//!
//! Progress on a neutral node belongs to `capturing_by`; on an owned node it
//! belongs to the owner. An enemy occupier first drains it to zero, which
//! neutralizes the node, and then builds it back up for itself.

use crate::constants::{capture_unit_factor, CAPTURE_PROGRESS_MAX};
use crate::map::{GameMap, MapNode};
use crate::types::{NodeOwner, PlayerSlot, RuntimeEvent, TieBreak};

use super::units::Unit;

/// Sole occupier of a node and how many of its units stand there.
fn occupier(node: &MapNode, units: &[Unit], radius: f32) -> Option<(PlayerSlot, usize)> {
    let center = node.position();
    let mut counts = [0usize; 2];
    for unit in units.iter().filter(|unit| unit.is_alive()) {
        if unit.position.distance(center) <= radius {
            counts[unit.owner as usize] += 1;
        }
    }
    match counts {
        [0, 0] => None,
        [n, 0] => Some((PlayerSlot::Player1, n)),
        [0, n] => Some((PlayerSlot::Player2, n)),
        _ => None,
    }
}

fn progress_holder(node: &MapNode) -> Option<PlayerSlot> {
    node.owner.slot().or(node.capturing_by)
}

fn advance_node(
    node: &mut MapNode,
    slot: PlayerSlot,
    amount: f32,
    events: &mut Vec<RuntimeEvent>,
) {
    let holder = progress_holder(node);
    if holder.is_some() && holder != Some(slot) && node.capture_progress > 0.0 {
        node.capture_progress -= amount;
        // A neutral node's progress stays with `capturing_by` until it is gone.
        if node.owner != NodeOwner::Neutral {
            node.capturing_by = Some(slot);
        }
        if node.capture_progress <= 0.0 {
            node.capture_progress = 0.0;
            node.capturing_by = Some(slot);
            if node.owner != NodeOwner::Neutral {
                node.owner = NodeOwner::Neutral;
                events.push(RuntimeEvent::NodeNeutralized {
                    node_id: node.id.clone(),
                });
            }
        }
        return;
    }

    if node.owner == NodeOwner::from(slot) {
        node.capture_progress = (node.capture_progress + amount).min(CAPTURE_PROGRESS_MAX);
        node.capturing_by = if node.capture_progress < CAPTURE_PROGRESS_MAX {
            Some(slot)
        } else {
            None
        };
        return;
    }

    node.capturing_by = Some(slot);
    node.capture_progress += amount;
    if node.capture_progress >= CAPTURE_PROGRESS_MAX {
        node.capture_progress = CAPTURE_PROGRESS_MAX;
        node.owner = NodeOwner::from(slot);
        node.capturing_by = None;
        events.push(RuntimeEvent::NodeCaptured {
            node_id: node.id.clone(),
            new_owner: slot,
        });
    }
}

/// Advances capture on every non-base node. Contested and empty nodes keep
/// their progress untouched.
pub fn update_capture(
    map: &mut GameMap,
    units: &[Unit],
    radius: f32,
    dt_sec: f32,
) -> Vec<RuntimeEvent> {
    let mut events = Vec::new();
    for node in map.nodes.iter_mut().filter(|node| !node.is_base()) {
        let Some((slot, count)) = occupier(node, units, radius) else {
            continue;
        };
        let rate = CAPTURE_PROGRESS_MAX / node.capture_time_sec() * capture_unit_factor(count);
        advance_node(node, slot, rate * dt_sec, &mut events);
    }
    events
}

/// Winner and loser once the round timer runs out.
pub fn decide_timeout(
    p1_nodes: usize,
    p2_nodes: usize,
    tie_break: TieBreak,
) -> (Option<PlayerSlot>, Option<PlayerSlot>) {
    let winner = if p1_nodes > p2_nodes {
        Some(PlayerSlot::Player1)
    } else if p2_nodes > p1_nodes {
        Some(PlayerSlot::Player2)
    } else {
        match tie_break {
            TieBreak::FirstPlayer => Some(PlayerSlot::Player1),
            TieBreak::Draw => None,
        }
    };
    (winner, winner.map(PlayerSlot::opponent))
}

/// The player holding every non-base node, if any.
pub fn dominating_player(map: &GameMap) -> Option<PlayerSlot> {
    let total = map.non_base_count();
    if total == 0 {
        return None;
    }
    PlayerSlot::ALL
        .into_iter()
        .find(|slot| map.captured_count(*slot) == total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UnitCatalog;
    use crate::constants::CAPTURE_RADIUS;
    use crate::types::{UnitType, Vec2};

    fn unit_on(map: &GameMap, node_id: &str, id: &str, owner: PlayerSlot) -> Unit {
        let node = map
            .nodes
            .iter()
            .find(|node| node.id == node_id)
            .expect("node exists");
        Unit::spawn(
            id.to_string(),
            UnitType::HtmlSoldier,
            owner,
            node.position(),
            &UnitCatalog::default(),
        )
    }

    fn node<'a>(map: &'a GameMap, id: &str) -> &'a MapNode {
        map.nodes.iter().find(|node| node.id == id).expect("node exists")
    }

    fn run(map: &mut GameMap, units: &[Unit], seconds: f32) -> Vec<RuntimeEvent> {
        let mut events = Vec::new();
        let ticks = (seconds * 20.0).round() as usize;
        for _ in 0..ticks {
            events.extend(update_capture(map, units, CAPTURE_RADIUS, 0.05));
        }
        events
    }

    #[test]
    fn single_unit_captures_html_node_in_ten_seconds() {
        let mut map = GameMap::new(&[]);
        let units = vec![unit_on(&map, "n1", "u1", PlayerSlot::Player1)];

        run(&mut map, &units, 9.0);
        assert_eq!(node(&map, "n1").owner, NodeOwner::Neutral);
        assert_eq!(node(&map, "n1").capturing_by, Some(PlayerSlot::Player1));

        let events = run(&mut map, &units, 1.05);
        assert_eq!(node(&map, "n1").owner, NodeOwner::Player1);
        assert_eq!(node(&map, "n1").capture_progress, 100.0);
        assert_eq!(
            events,
            vec![RuntimeEvent::NodeCaptured {
                node_id: "n1".to_string(),
                new_owner: PlayerSlot::Player1,
            }]
        );
        assert_eq!(map.captured_count(PlayerSlot::Player1), 1);
    }

    #[test]
    fn more_units_capture_faster_with_diminishing_returns() {
        let mut map = GameMap::new(&[]);
        let units = vec![
            unit_on(&map, "n1", "u1", PlayerSlot::Player1),
            unit_on(&map, "n1", "u2", PlayerSlot::Player1),
        ];
        run(&mut map, &units, 1.0);
        assert!((node(&map, "n1").capture_progress - 17.0).abs() < 1e-2);
    }

    #[test]
    fn contested_node_is_frozen() {
        let mut map = GameMap::new(&[]);
        let solo = vec![unit_on(&map, "n5", "u1", PlayerSlot::Player1)];
        run(&mut map, &solo, 2.0);
        let before = node(&map, "n5").capture_progress;

        let contested = vec![
            unit_on(&map, "n5", "u1", PlayerSlot::Player1),
            unit_on(&map, "n5", "u2", PlayerSlot::Player2),
        ];
        run(&mut map, &contested, 5.0);
        assert_eq!(node(&map, "n5").capture_progress, before);
        assert_eq!(node(&map, "n5").owner, NodeOwner::Neutral);
    }

    #[test]
    fn enemy_drains_then_neutralizes_then_captures() {
        let mut map = GameMap::new(&[]);
        let ours = vec![unit_on(&map, "n1", "u1", PlayerSlot::Player1)];
        run(&mut map, &ours, 10.05);
        assert_eq!(node(&map, "n1").owner, NodeOwner::Player1);

        let theirs = vec![unit_on(&map, "n1", "u2", PlayerSlot::Player2)];
        let events = run(&mut map, &theirs, 10.05);
        assert_eq!(node(&map, "n1").owner, NodeOwner::Neutral);
        assert!(events.contains(&RuntimeEvent::NodeNeutralized {
            node_id: "n1".to_string(),
        }));

        let events = run(&mut map, &theirs, 10.05);
        assert_eq!(node(&map, "n1").owner, NodeOwner::Player2);
        assert!(events.contains(&RuntimeEvent::NodeCaptured {
            node_id: "n1".to_string(),
            new_owner: PlayerSlot::Player2,
        }));
    }

    #[test]
    fn partial_progress_is_drained_before_the_intruder_builds() {
        let mut map = GameMap::new(&[]);
        let ours = vec![unit_on(&map, "n1", "u1", PlayerSlot::Player1)];
        run(&mut map, &ours, 5.0);
        assert!((node(&map, "n1").capture_progress - 50.0).abs() < 0.5);

        let theirs = vec![unit_on(&map, "n1", "u2", PlayerSlot::Player2)];
        run(&mut map, &theirs, 0.1);
        assert!(node(&map, "n1").capture_progress < 50.0);
        assert_eq!(node(&map, "n1").capturing_by, Some(PlayerSlot::Player1));

        let events = run(&mut map, &theirs, 5.0);
        assert!(events.is_empty());
        assert_eq!(node(&map, "n1").owner, NodeOwner::Neutral);
        assert_eq!(node(&map, "n1").capturing_by, Some(PlayerSlot::Player2));
        assert!(node(&map, "n1").capture_progress < 50.0);

        let events = run(&mut map, &theirs, 10.0);
        assert_eq!(node(&map, "n1").owner, NodeOwner::Player2);
        assert_eq!(
            events,
            vec![RuntimeEvent::NodeCaptured {
                node_id: "n1".to_string(),
                new_owner: PlayerSlot::Player2,
            }]
        );
    }

    #[test]
    fn bases_are_never_captured() {
        let mut map = GameMap::new(&[]);
        let raiders = vec![unit_on(&map, "base_p2", "u1", PlayerSlot::Player1)];
        let events = run(&mut map, &raiders, 60.0);
        assert!(events.is_empty());
        assert_eq!(node(&map, "base_p2").owner, NodeOwner::Player2);
    }

    #[test]
    fn units_outside_the_radius_do_not_capture() {
        let mut map = GameMap::new(&[]);
        let mut unit = unit_on(&map, "n1", "u1", PlayerSlot::Player1);
        unit.position = Vec2::new(unit.position.x + 1.6, unit.position.y);
        run(&mut map, &[unit], 5.0);
        assert_eq!(node(&map, "n1").capture_progress, 0.0);
    }

    #[test]
    fn timeout_goes_to_the_node_leader() {
        assert_eq!(
            decide_timeout(2, 1, TieBreak::FirstPlayer),
            (Some(PlayerSlot::Player1), Some(PlayerSlot::Player2))
        );
        assert_eq!(
            decide_timeout(0, 3, TieBreak::FirstPlayer),
            (Some(PlayerSlot::Player2), Some(PlayerSlot::Player1))
        );
    }

    #[test]
    fn timeout_tie_follows_the_tie_break() {
        assert_eq!(
            decide_timeout(2, 2, TieBreak::FirstPlayer),
            (Some(PlayerSlot::Player1), Some(PlayerSlot::Player2))
        );
        assert_eq!(decide_timeout(0, 0, TieBreak::Draw), (None, None));
    }

    #[test]
    fn owning_every_node_dominates() {
        let mut map = GameMap::new(&[]);
        assert_eq!(dominating_player(&map), None);
        for node in map.nodes.iter_mut().filter(|node| !node.is_base()) {
            node.owner = NodeOwner::Player2;
        }
        assert_eq!(dominating_player(&map), Some(PlayerSlot::Player2));
        map.nodes[2].owner = NodeOwner::Neutral;
        assert_eq!(dominating_player(&map), None);
    }
}
