use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    pub const LATERAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "north" => Some(Self::North),
            "south" => Some(Self::South),
            "east" => Some(Self::East),
            "west" => Some(Self::West),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    /// Grid delta for lateral directions; `(0, 0)` for up/down.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
            Self::Up | Self::Down => (0, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub level: i32,
}

/// One flag per lateral direction; used for both solid walls and the
/// secret-door mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WallFlags {
    pub north: bool,
    pub south: bool,
    pub east: bool,
    pub west: bool,
}

impl WallFlags {
    pub fn all() -> Self {
        Self {
            north: true,
            south: true,
            east: true,
            west: true,
        }
    }

    pub fn get(&self, dir: Direction) -> bool {
        match dir {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
            Direction::Up | Direction::Down => false,
        }
    }

    pub fn set(&mut self, dir: Direction, value: bool) {
        match dir {
            Direction::North => self.north = value,
            Direction::South => self.south = value,
            Direction::East => self.east = value,
            Direction::West => self.west = value,
            Direction::Up | Direction::Down => {}
        }
    }

    pub fn any(&self) -> bool {
        self.north || self.south || self.east || self.west
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StairFlags {
    pub up: bool,
    pub down: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Key,
    Flashlight,
    Potion,
    Map,
}

#[derive(Clone, Debug, Serialize)]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub position: Position,
}

#[derive(Clone, Debug, Serialize)]
pub struct MazeCell {
    pub walls: WallFlags,
    #[serde(rename = "secretDoors")]
    pub secret_doors: WallFlags,
    #[serde(rename = "hasStairs")]
    pub stairs: StairFlags,
    pub items: Vec<Item>,
}

impl MazeCell {
    pub fn sealed() -> Self {
        Self {
            walls: WallFlags::all(),
            secret_doors: WallFlags::default(),
            stairs: StairFlags::default(),
            items: Vec::new(),
        }
    }

    /// Replacement for cells outside the viewer's fog-of-war mask:
    /// nothing is advertised, not even the wall layout.
    pub fn blank() -> Self {
        Self {
            walls: WallFlags::default(),
            secret_doors: WallFlags::default(),
            stairs: StairFlags::default(),
            items: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterKind {
    Goblin,
    Troll,
    Dragon,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonsterView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MonsterKind,
    pub position: Position,
    pub health: i32,
    pub damage: i32,
    pub visibility: i32,
    #[serde(rename = "moveIntervalMs")]
    pub move_interval_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub position: Position,
    pub health: i32,
    pub inventory: Vec<Item>,
}

impl PlayerView {
    pub fn holds(&self, kind: ItemKind) -> bool {
        self.inventory.iter().any(|item| item.kind == kind)
    }
}

/// Per-player cumulative fog-of-war knowledge: `cells[level][y][x]` is true
/// once that cell has ever been visible to the player. Allocated lazily to
/// the maze dimensions on first update.
#[derive(Clone, Debug, Serialize)]
pub struct MapKnowledge {
    pub cells: Vec<Vec<Vec<bool>>>,
    #[serde(rename = "startPosition")]
    pub start_position: Position,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Ongoing,
    Finished,
}

#[derive(Clone, Debug, Serialize)]
pub struct Winner {
    #[serde(rename = "playerId")]
    pub player_id: String,
    #[serde(rename = "playerName")]
    pub player_name: String,
    #[serde(rename = "exitedWithKey")]
    pub exited_with_key: bool,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct DifficultySettings {
    #[serde(rename = "monsterCount")]
    pub monster_count: i32,
    #[serde(rename = "monsterMoveIntervalMs")]
    pub monster_move_interval_ms: u64,
    #[serde(rename = "monsterVisibility")]
    pub monster_visibility: i32,
    #[serde(rename = "monsterDamage")]
    pub monster_damage: i32,
    #[serde(rename = "monsterPursuitEnabled")]
    pub monster_pursuit_enabled: bool,
    #[serde(rename = "playerVisibility")]
    pub player_visibility: i32,
    #[serde(rename = "healingPotionCount")]
    pub healing_potion_count: i32,
    #[serde(rename = "healingPotionStrength")]
    pub healing_potion_strength: i32,
    #[serde(rename = "playerVsPlayerEnabled")]
    pub player_vs_player_enabled: bool,
    #[serde(rename = "secretDoorChance")]
    pub secret_door_chance: f32,
    #[serde(rename = "allowTrolls")]
    pub allow_trolls: bool,
    #[serde(rename = "allowDragons")]
    pub allow_dragons: bool,
    #[serde(rename = "mapDropChance")]
    pub map_drop_chance: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct CombatResult {
    pub attacker: String,
    pub defender: String,
    pub damage: i32,
    #[serde(rename = "isMonster", skip_serializing_if = "std::ops::Not::not")]
    pub is_monster: bool,
    #[serde(rename = "itemStolen", skip_serializing_if = "Option::is_none")]
    pub item_stolen: Option<Item>,
    #[serde(rename = "mapStolen", skip_serializing_if = "std::ops::Not::not")]
    pub map_stolen: bool,
}

/// Everything the transport layer needs to broadcast after one move.
#[derive(Clone, Debug, Serialize)]
pub struct MoveOutcome {
    pub success: bool,
    #[serde(rename = "combatResults")]
    pub combat_results: Vec<CombatResult>,
    #[serde(rename = "gameWon")]
    pub game_won: bool,
    #[serde(rename = "secretDoorFound")]
    pub secret_door_found: bool,
    #[serde(rename = "mapDropped")]
    pub map_dropped: bool,
    /// Players removed from the roster because combat left them at
    /// health <= 0.
    pub casualties: Vec<PlayerView>,
}

impl MoveOutcome {
    pub fn blocked() -> Self {
        Self {
            success: false,
            combat_results: Vec::new(),
            game_won: false,
            secret_door_found: false,
            map_dropped: false,
            casualties: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UseItemOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameListing {
    pub id: String,
    #[serde(rename = "playerCount")]
    pub player_count: usize,
    pub status: GameStatus,
    #[serde(rename = "createdAt")]
    pub created_at_iso: String,
}

/// Visibility-filtered snapshot of one game, addressed to a single player.
/// Non-visible cells are blanked and non-visible entities dropped before
/// this ever reaches the transport layer.
#[derive(Clone, Debug, Serialize)]
pub struct VisibleState {
    pub id: String,
    pub status: GameStatus,
    pub difficulty: i32,
    #[serde(rename = "exitPosition")]
    pub exit_position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    pub width: i32,
    pub height: i32,
    pub levels: i32,
    pub grid: Vec<Vec<Vec<MazeCell>>>,
    pub players: Vec<PlayerView>,
    pub monsters: Vec<MonsterView>,
    /// The requesting player's own cumulative map knowledge.
    pub map: MapKnowledge,
}
