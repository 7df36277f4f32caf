//! The fixed symmetric battlefield: nine capture nodes on a 20 × 15 grid.

use crate::catalog::grade_stats;
use crate::constants::{CAPTURE_PROGRESS_MAX, MAP_HEIGHT, MAP_WIDTH};
use crate::pathfinding::GridPoint;
use crate::types::{MapNodeView, NodeGrade, NodeOwner, PlayerSlot, Vec2};

#[derive(Clone, Debug)]
pub struct MapNode {
    pub id: String,
    pub grade: NodeGrade,
    pub x: i32,
    pub y: i32,
    pub owner: NodeOwner,
    pub capture_progress: f32,
    pub capturing_by: Option<PlayerSlot>,
    /// Set for the two home nodes; they never change hands.
    pub base_of: Option<PlayerSlot>,
}

impl MapNode {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    pub fn is_base(&self) -> bool {
        self.base_of.is_some()
    }

    pub fn capture_time_sec(&self) -> f32 {
        grade_stats(self.grade).capture_time_sec
    }

    pub fn view(&self) -> MapNodeView {
        let grade = grade_stats(self.grade);
        MapNodeView {
            id: self.id.clone(),
            grade: self.grade,
            x: self.x,
            y: self.y,
            owner: self.owner,
            capture_progress: self.capture_progress,
            capturing_by: self.capturing_by,
            resource_bonus: grade.resource_bonus,
            defense: grade.defense,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GameMap {
    pub width: i32,
    pub height: i32,
    pub nodes: Vec<MapNode>,
    walkable: Vec<Vec<bool>>,
}

impl GameMap {
    pub fn new(blocked_cells: &[[i32; 2]]) -> Self {
        let mut walkable = vec![vec![true; MAP_WIDTH as usize]; MAP_HEIGHT as usize];
        for &[x, y] in blocked_cells {
            if x < 0 || y < 0 {
                continue;
            }
            if let Some(cell) = walkable
                .get_mut(y as usize)
                .and_then(|row| row.get_mut(x as usize))
            {
                *cell = false;
            }
        }

        let mut map = Self {
            width: MAP_WIDTH,
            height: MAP_HEIGHT,
            nodes: initial_nodes(),
            walkable,
        };
        // Nodes stay reachable whatever the obstacle list says.
        for idx in 0..map.nodes.len() {
            let (x, y) = (map.nodes[idx].x, map.nodes[idx].y);
            map.walkable[y as usize][x as usize] = true;
        }
        map
    }

    pub fn walkable(&self) -> &[Vec<bool>] {
        &self.walkable
    }

    pub fn base_of(&self, slot: PlayerSlot) -> Option<&MapNode> {
        self.nodes.iter().find(|node| node.base_of == Some(slot))
    }

    /// Nodes owned by `slot`, excluding its own base.
    pub fn captured_count(&self, slot: PlayerSlot) -> usize {
        self.nodes
            .iter()
            .filter(|node| !node.is_base() && node.owner == NodeOwner::from(slot))
            .count()
    }

    pub fn non_base_count(&self) -> usize {
        self.nodes.iter().filter(|node| !node.is_base()).count()
    }

    pub fn clamp_point(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(
            x.clamp(0.0, (self.width - 1) as f32),
            y.clamp(0.0, (self.height - 1) as f32),
        )
    }

    pub fn cell_of(&self, position: Vec2) -> GridPoint {
        GridPoint::new(
            (position.x.round() as i32).clamp(0, self.width - 1),
            (position.y.round() as i32).clamp(0, self.height - 1),
        )
    }
}

fn node(id: &str, grade: NodeGrade, x: i32, y: i32, base_of: Option<PlayerSlot>) -> MapNode {
    let owner = base_of.map(NodeOwner::from).unwrap_or(NodeOwner::Neutral);
    MapNode {
        id: id.to_string(),
        grade,
        x,
        y,
        owner,
        capture_progress: if base_of.is_some() {
            CAPTURE_PROGRESS_MAX
        } else {
            0.0
        },
        capturing_by: None,
        base_of,
    }
}

fn initial_nodes() -> Vec<MapNode> {
    vec![
        node("base_p1", NodeGrade::Html, 1, 7, Some(PlayerSlot::Player1)),
        node("base_p2", NodeGrade::Html, 18, 7, Some(PlayerSlot::Player2)),
        node("n1", NodeGrade::Html, 5, 3, None),
        node("n2", NodeGrade::Css, 5, 11, None),
        node("n3", NodeGrade::Html, 15, 3, None),
        node("n4", NodeGrade::Css, 15, 11, None),
        node("n5", NodeGrade::Js, 8, 5, None),
        node("n6", NodeGrade::Js, 12, 9, None),
        node("boss", NodeGrade::Fullstack, 10, 7, None),
    ]
}
