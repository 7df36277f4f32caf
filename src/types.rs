use serde::{Deserialize, Serialize};

/// One holding of each of the three resources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    pub html: f32,
    pub css: f32,
    pub js: f32,
}

impl Resources {
    pub const ZERO: Resources = Resources {
        html: 0.0,
        css: 0.0,
        js: 0.0,
    };

    pub fn new(html: f32, css: f32, js: f32) -> Self {
        Self { html, css, js }
    }

    pub fn map(self, mut f: impl FnMut(f32) -> f32) -> Self {
        Self {
            html: f(self.html),
            css: f(self.css),
            js: f(self.js),
        }
    }

    pub fn zip_with(self, other: Resources, mut f: impl FnMut(f32, f32) -> f32) -> Self {
        Self {
            html: f(self.html, other.html),
            css: f(self.css, other.css),
            js: f(self.js, other.js),
        }
    }

    pub fn clamp(self, cap: f32) -> Self {
        self.map(|value| value.clamp(0.0, cap))
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> {
        [self.html, self.css, self.js].into_iter()
    }

    pub fn covers(&self, cost: &Resources) -> bool {
        self.html >= cost.html && self.css >= cost.css && self.js >= cost.js
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    HtmlSoldier,
    CssGuardian,
    JsStriker,
    HtmlKnight,
    CssMage,
    JsAssassin,
    HtmlTitan,
    CssArchmage,
    JsOverlord,
    ApiConnector,
    DebugDrone,
    Firewall,
}

impl UnitType {
    pub const ALL: [UnitType; 12] = [
        UnitType::HtmlSoldier,
        UnitType::CssGuardian,
        UnitType::JsStriker,
        UnitType::HtmlKnight,
        UnitType::CssMage,
        UnitType::JsAssassin,
        UnitType::HtmlTitan,
        UnitType::CssArchmage,
        UnitType::JsOverlord,
        UnitType::ApiConnector,
        UnitType::DebugDrone,
        UnitType::Firewall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HtmlSoldier => "html_soldier",
            Self::CssGuardian => "css_guardian",
            Self::JsStriker => "js_striker",
            Self::HtmlKnight => "html_knight",
            Self::CssMage => "css_mage",
            Self::JsAssassin => "js_assassin",
            Self::HtmlTitan => "html_titan",
            Self::CssArchmage => "css_archmage",
            Self::JsOverlord => "js_overlord",
            Self::ApiConnector => "api_connector",
            Self::DebugDrone => "debug_drone",
            Self::Firewall => "firewall",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

/// Combat category used for matchup multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterClass {
    /// Markup class.
    Html,
    /// Style class.
    Css,
    /// Scripting class.
    Js,
    Special,
}

impl CounterClass {
    pub const ALL: [CounterClass; 4] = [
        CounterClass::Html,
        CounterClass::Css,
        CounterClass::Js,
        CounterClass::Special,
    ];

    /// The class this one deals advantage damage to.
    pub fn beats(self) -> Option<CounterClass> {
        match self {
            Self::Html => Some(Self::Js),
            Self::Js => Some(Self::Css),
            Self::Css => Some(Self::Html),
            Self::Special => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterRelation {
    Advantage,
    Neutral,
    Disadvantage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    Tank,
    Support,
    Dps,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    /// Adjacent allies take reduced damage.
    GuardAura,
    /// Doubles the first hit, then is spent.
    FirstStrike,
    /// Every allied unit takes reduced damage.
    RallyAura,
    /// Each attack strikes up to three enemies in reach.
    Splash,
    /// Adjacent allies hit harder.
    Synergy,
    /// Removes one enemy outright on a long cooldown.
    Execute,
    /// Enemies inside the field move at reduced speed.
    SlowField,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub tier: u8,
    pub role: UnitRole,
    #[serde(rename = "counterClass", alias = "counter_class")]
    pub counter_class: CounterClass,
    pub hp: i32,
    pub atk: f32,
    pub speed: f32,
    pub cost: Resources,
    pub upkeep: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<Ability>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeGrade {
    Html,
    Css,
    Js,
    Fullstack,
}

/// Per-grade node data. Only the capture time feeds the simulation; the
/// resource bonus and defense are shown to clients on the node view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GradeStats {
    #[serde(rename = "resourceBonus")]
    pub resource_bonus: f32,
    pub defense: i32,
    #[serde(rename = "captureTimeSec")]
    pub capture_time_sec: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSlot {
    Player1,
    Player2,
}

impl PlayerSlot {
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::Player1, PlayerSlot::Player2];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player1 => "player1",
            Self::Player2 => "player2",
        }
    }

    pub fn opponent(self) -> PlayerSlot {
        match self {
            Self::Player1 => Self::Player2,
            Self::Player2 => Self::Player1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOwner {
    Neutral,
    Player1,
    Player2,
}

impl NodeOwner {
    pub fn slot(self) -> Option<PlayerSlot> {
        match self {
            Self::Neutral => None,
            Self::Player1 => Some(PlayerSlot::Player1),
            Self::Player2 => Some(PlayerSlot::Player2),
        }
    }
}

impl From<PlayerSlot> for NodeOwner {
    fn from(slot: PlayerSlot) -> Self {
        match slot {
            PlayerSlot::Player1 => Self::Player1,
            PlayerSlot::Player2 => Self::Player2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Playing,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    OpponentLeft,
    TimeUp,
    Domination,
}

/// Decides the timeout winner when both players hold the same node count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    FirstPlayer,
    Draw,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Player intent, queued until the next tick boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    ProduceUnit {
        unit_type: UnitType,
    },
    MoveUnits {
        unit_ids: Vec<String>,
        target_x: f32,
        target_y: f32,
    },
    /// Sends units to an enemy unit's current position.
    Attack {
        unit_ids: Vec<String>,
        target_id: String,
    },
    /// Sends units onto a map node.
    CaptureNode {
        unit_ids: Vec<String>,
        node_id: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GameResult {
    #[serde(rename = "winnerId")]
    pub winner_id: Option<PlayerSlot>,
    #[serde(rename = "loserId")]
    pub loser_id: Option<PlayerSlot>,
    pub reason: GameOverReason,
    #[serde(rename = "p1Nodes")]
    pub p1_nodes: usize,
    #[serde(rename = "p2Nodes")]
    pub p2_nodes: usize,
    #[serde(rename = "durationSec")]
    pub duration_sec: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    GameStart,
    GameResult {
        #[serde(flatten)]
        result: GameResult,
    },
    UnitProduced {
        #[serde(rename = "unitId")]
        unit_id: String,
        owner: PlayerSlot,
        #[serde(rename = "unitType")]
        unit_type: UnitType,
    },
    UnitDeath {
        #[serde(rename = "unitId")]
        unit_id: String,
        owner: PlayerSlot,
        #[serde(rename = "killerUnitId")]
        killer_unit_id: Option<String>,
        x: f32,
        y: f32,
    },
    NodeCaptured {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "newOwner")]
        new_owner: PlayerSlot,
    },
    NodeNeutralized {
        #[serde(rename = "nodeId")]
        node_id: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerSlot,
    pub resources: Resources,
    #[serde(rename = "unitCount")]
    pub unit_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    pub id: String,
    #[serde(rename = "typeId")]
    pub unit_type: UnitType,
    pub owner: PlayerSlot,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    #[serde(rename = "maxHp")]
    pub max_hp: i32,
    #[serde(rename = "targetX")]
    pub target_x: f32,
    #[serde(rename = "targetY")]
    pub target_y: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapNodeView {
    pub id: String,
    pub grade: NodeGrade,
    pub x: i32,
    pub y: i32,
    pub owner: NodeOwner,
    #[serde(rename = "captureProgress")]
    pub capture_progress: f32,
    #[serde(rename = "capturingBy")]
    pub capturing_by: Option<PlayerSlot>,
    #[serde(rename = "resourceBonus")]
    pub resource_bonus: f32,
    pub defense: i32,
}
