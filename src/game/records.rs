//! Decoded entity records
//!
//! Plain values produced by the packet handlers and handed to the world by
//! value. Nothing in the protocol layer keeps them after the call.

use std::collections::BTreeMap;
use std::fmt;

/// A position on the map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Appearance of a character: body, face, hair and visible equipment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookEntry {
    pub female: bool,
    pub skin: u8,
    pub face_id: i32,
    pub hair_id: i32,
    /// Equip item ids by slot
    pub equips: BTreeMap<u8, i32>,
    /// Equips hidden under cash items, by slot
    pub masked_equips: BTreeMap<u8, i32>,
    /// Cash weapon shown over the real weapon (0 if none)
    pub cash_weapon: i32,
    pub pet_ids: [i32; 3],
}

/// A pet carried on a spawned character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetEntry {
    pub item_id: i32,
    pub name: String,
    pub unique_id: i32,
    pub position: Point,
    pub stance: i8,
    pub foothold: i32,
}

/// Another player entering the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSpawn {
    pub id: i32,
    pub level: u8,
    pub name: String,
    pub job: i16,
    pub look: LookEntry,
    /// Buff value, read as 2 bytes when morphed and 1 byte otherwise
    pub buff_value: i16,
    pub morphed: bool,
    pub position: Point,
    pub stance: i8,
    pub pets: Vec<PetEntry>,
    pub chalkboard: Option<String>,
}

/// A pet being summoned next to a character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetSpawn {
    pub index: u8,
    pub item_id: i32,
    pub name: String,
    pub unique_id: i32,
    pub position: Point,
    pub stance: u8,
    pub foothold: i32,
}

/// Visual effect shown on another character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignEffect {
    /// HP recovery (effect code 10)
    Recovery { amount: u8 },
    /// Monster card pickup (effect code 13)
    MonsterCard,
    /// Skill buff animation for any other effect code
    SkillBuff { skill_id: i32, effect: i8 },
}

impl ForeignEffect {
    pub const RECOVERY_CODE: i8 = 10;
    pub const MONSTER_CARD_CODE: i8 = 13;
}

/// One fragment of a movement path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub command: u8,
    pub kind: MovementKind,
    pub position: Point,
    pub last_position: Point,
    pub foothold: u16,
    pub new_state: u8,
    pub duration: u16,
}

/// How a movement fragment positions the object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementKind {
    /// Carries no position (equip change and unknown commands)
    None,
    /// Absolute position with velocity
    Absolute,
    /// Offset from the current position
    Relative,
    /// Instant move to the given position
    Teleport,
    /// Sitting on a chair
    Chair,
}

/// A monster entering the map, or control of one being granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MobSpawn {
    pub oid: i32,
    pub id: i32,
    /// Controller mode; 0 for plain spawns
    pub control: i8,
    pub stance: i8,
    pub foothold: u16,
    /// Spawned with the appear animation (effect code -2)
    pub new_spawn: bool,
    pub team: i8,
    pub position: Point,
}

/// An NPC entering the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NpcSpawn {
    pub oid: i32,
    pub id: i32,
    pub position: Point,
    pub flip: bool,
    pub foothold: u16,
}

/// An item or meso bag on the ground
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropSpawn {
    pub oid: i32,
    /// Item id, or the meso amount when `meso` is set
    pub id: i32,
    pub meso: bool,
    pub owner: i32,
    pub drop_from: Point,
    pub drop_to: Point,
    pub pickup_type: i8,
    pub mode: i8,
    pub player_drop: bool,
}

/// Who picked up a drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Looter {
    /// Expired or removed without a looter
    Nobody,
    Character(i32),
    /// A pet of the given character
    Pet { owner: i32, index: u8 },
}

/// A reactor (interactive map object)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactorSpawn {
    pub oid: i32,
    pub id: i32,
    pub state: i8,
    pub position: Point,
}
