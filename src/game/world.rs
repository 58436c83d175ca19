//! World collaborator interface
//!
//! The map state lives outside the session layer. Handlers reach it only
//! through these traits, one per entity kind, and make exactly one call per
//! packet. Anything that implements all five is a [`World`].
//!
//! [`EventLog`] is a recording implementation: every call becomes a
//! [`WorldEvent`] in arrival order.

use tracing::debug;

use crate::game::records::{
    CharSpawn, DropSpawn, ForeignEffect, LookEntry, Looter, MobSpawn, Movement, NpcSpawn,
    PetSpawn, Point, ReactorSpawn,
};

/// Other characters on the map
pub trait CharacterStage {
    fn spawn_character(&mut self, record: CharSpawn);
    fn remove_character(&mut self, id: i32);
    fn update_look(&mut self, id: i32, look: LookEntry);
    fn send_movement(&mut self, id: i32, movements: Vec<Movement>);
    fn spawn_pet(&mut self, owner: i32, pet: PetSpawn);
    fn remove_pet(&mut self, owner: i32, index: u8, hunger: bool);
    fn show_foreign_effect(&mut self, id: i32, effect: ForeignEffect);
}

/// Monsters on the map
pub trait MobStage {
    fn spawn_mob(&mut self, record: MobSpawn);
    fn remove_mob(&mut self, oid: i32, animation: i8);
    fn set_mob_control(&mut self, oid: i32, controlled: bool);
    fn send_mob_movement(&mut self, oid: i32, position: Point, movements: Vec<Movement>);
    fn show_mob_hp(&mut self, oid: i32, hp_percent: i8);
}

/// NPCs on the map
pub trait NpcStage {
    fn spawn_npc(&mut self, record: NpcSpawn);
    fn remove_npc(&mut self, oid: i32);
}

/// Items and mesos on the ground
pub trait DropStage {
    fn spawn_drop(&mut self, record: DropSpawn);
    fn remove_drop(&mut self, oid: i32, mode: i8, looter: Looter);
}

/// Reactors on the map
pub trait ReactorStage {
    fn spawn_reactor(&mut self, record: ReactorSpawn);
    fn remove_reactor(&mut self, oid: i32, state: i8, position: Point);
}

/// Everything the handlers may touch
pub trait World: CharacterStage + MobStage + NpcStage + DropStage + ReactorStage {}

impl<T> World for T where T: CharacterStage + MobStage + NpcStage + DropStage + ReactorStage {}

/// One recorded world call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    CharacterSpawned(CharSpawn),
    CharacterRemoved(i32),
    LookUpdated(i32, LookEntry),
    CharacterMoved(i32, Vec<Movement>),
    PetSpawned(i32, PetSpawn),
    PetRemoved { owner: i32, index: u8, hunger: bool },
    ForeignEffectShown(i32, ForeignEffect),
    MobSpawned(MobSpawn),
    MobRemoved { oid: i32, animation: i8 },
    MobControlSet { oid: i32, controlled: bool },
    MobMoved(i32, Point, Vec<Movement>),
    MobHpShown { oid: i32, hp_percent: i8 },
    NpcSpawned(NpcSpawn),
    NpcRemoved(i32),
    DropSpawned(DropSpawn),
    DropRemoved { oid: i32, mode: i8, looter: Looter },
    ReactorSpawned(ReactorSpawn),
    ReactorRemoved { oid: i32, state: i8, position: Point },
}

/// World implementation that records every call
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<WorldEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, oldest first
    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take all recorded events
    pub fn drain(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    fn record(&mut self, event: WorldEvent) {
        debug!(event = ?event, "World event");
        self.events.push(event);
    }
}

impl CharacterStage for EventLog {
    fn spawn_character(&mut self, record: CharSpawn) {
        self.record(WorldEvent::CharacterSpawned(record));
    }

    fn remove_character(&mut self, id: i32) {
        self.record(WorldEvent::CharacterRemoved(id));
    }

    fn update_look(&mut self, id: i32, look: LookEntry) {
        self.record(WorldEvent::LookUpdated(id, look));
    }

    fn send_movement(&mut self, id: i32, movements: Vec<Movement>) {
        self.record(WorldEvent::CharacterMoved(id, movements));
    }

    fn spawn_pet(&mut self, owner: i32, pet: PetSpawn) {
        self.record(WorldEvent::PetSpawned(owner, pet));
    }

    fn remove_pet(&mut self, owner: i32, index: u8, hunger: bool) {
        self.record(WorldEvent::PetRemoved {
            owner,
            index,
            hunger,
        });
    }

    fn show_foreign_effect(&mut self, id: i32, effect: ForeignEffect) {
        self.record(WorldEvent::ForeignEffectShown(id, effect));
    }
}

impl MobStage for EventLog {
    fn spawn_mob(&mut self, record: MobSpawn) {
        self.record(WorldEvent::MobSpawned(record));
    }

    fn remove_mob(&mut self, oid: i32, animation: i8) {
        self.record(WorldEvent::MobRemoved { oid, animation });
    }

    fn set_mob_control(&mut self, oid: i32, controlled: bool) {
        self.record(WorldEvent::MobControlSet { oid, controlled });
    }

    fn send_mob_movement(&mut self, oid: i32, position: Point, movements: Vec<Movement>) {
        self.record(WorldEvent::MobMoved(oid, position, movements));
    }

    fn show_mob_hp(&mut self, oid: i32, hp_percent: i8) {
        self.record(WorldEvent::MobHpShown { oid, hp_percent });
    }
}

impl NpcStage for EventLog {
    fn spawn_npc(&mut self, record: NpcSpawn) {
        self.record(WorldEvent::NpcSpawned(record));
    }

    fn remove_npc(&mut self, oid: i32) {
        self.record(WorldEvent::NpcRemoved(oid));
    }
}

impl DropStage for EventLog {
    fn spawn_drop(&mut self, record: DropSpawn) {
        self.record(WorldEvent::DropSpawned(record));
    }

    fn remove_drop(&mut self, oid: i32, mode: i8, looter: Looter) {
        self.record(WorldEvent::DropRemoved { oid, mode, looter });
    }
}

impl ReactorStage for EventLog {
    fn spawn_reactor(&mut self, record: ReactorSpawn) {
        self.record(WorldEvent::ReactorSpawned(record));
    }

    fn remove_reactor(&mut self, oid: i32, state: i8, position: Point) {
        self.record(WorldEvent::ReactorRemoved {
            oid,
            state,
            position,
        });
    }
}
