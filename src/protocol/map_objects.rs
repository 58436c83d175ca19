//! Map object handlers
//!
//! One unit struct per receive opcode for things that appear on, move on,
//! or leave the current map. Each reads its fixed field sequence from the
//! cursor and makes a single world call. Fields the client has no use for
//! are still read (or skipped) so that everything after them lines up.

use tracing::debug;

use crate::error::PacketError;
use crate::game::records::{
    CharSpawn, DropSpawn, ForeignEffect, Looter, MobSpawn, NpcSpawn, PetEntry, PetSpawn,
    ReactorSpawn,
};
use crate::game::world::World;
use crate::net::buffer::InPacket;
use crate::protocol::dispatcher::{Dispatcher, PacketHandler};
use crate::protocol::look::parse_look;
use crate::protocol::movement::parse_movements;
use crate::protocol::opcodes::RecvOpcode;

/// Pet slots carried on a spawned character
const MAX_PETS: usize = 3;

/// Mob spawn effect that carries one more byte
const MOB_EFFECT_EXTENDED: i8 = 15;

/// Mob spawn effect for a fresh spawn (appear animation)
const MOB_EFFECT_NEW_SPAWN: i8 = -2;

/// Drop mode whose start position equals its destination
const DROP_MODE_IN_PLACE: i8 = 2;

/// Register every handler in this module
pub fn register_all(dispatcher: &mut Dispatcher) {
    dispatcher.register(RecvOpcode::SpawnChar, SpawnCharHandler);
    dispatcher.register(RecvOpcode::RemoveChar, RemoveCharHandler);
    dispatcher.register(RecvOpcode::SpawnPet, SpawnPetHandler);
    dispatcher.register(RecvOpcode::CharMoved, CharMovedHandler);
    dispatcher.register(RecvOpcode::UpdateCharLook, UpdateCharLookHandler);
    dispatcher.register(RecvOpcode::ShowForeignEffect, ShowForeignEffectHandler);
    dispatcher.register(RecvOpcode::SpawnMob, SpawnMobHandler);
    dispatcher.register(RecvOpcode::KillMob, KillMobHandler);
    dispatcher.register(RecvOpcode::SpawnMobController, SpawnMobControllerHandler);
    dispatcher.register(RecvOpcode::MobMoved, MobMovedHandler);
    dispatcher.register(RecvOpcode::ShowMobHp, ShowMobHpHandler);
    dispatcher.register(RecvOpcode::SpawnNpc, SpawnNpcHandler);
    dispatcher.register(RecvOpcode::SpawnNpcController, SpawnNpcControllerHandler);
    dispatcher.register(RecvOpcode::DropLoot, DropLootHandler);
    dispatcher.register(RecvOpcode::RemoveLoot, RemoveLootHandler);
    dispatcher.register(RecvOpcode::SpawnReactor, SpawnReactorHandler);
    dispatcher.register(RecvOpcode::RemoveReactor, RemoveReactorHandler);
}

// ============ Characters ============

/// Another player entering the map
pub struct SpawnCharHandler;

impl PacketHandler for SpawnCharHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let id = recv.read_int()?;
        let level = recv.read_ubyte()?;
        let name = recv.read_string()?;

        // Guild name, logo background, colour, logo, colour
        recv.read_string()?;
        recv.read_short()?;
        recv.read_byte()?;
        recv.read_short()?;
        recv.read_byte()?;

        recv.skip(8)?;

        let morphed = recv.read_int()? == 2;
        let buff_mask = recv.read_int()?;
        let buff_value = if buff_mask == 0 {
            0
        } else if morphed {
            recv.read_short()?
        } else {
            i16::from(recv.read_byte()?)
        };
        recv.read_int()?; // second buff mask

        recv.skip(43)?;
        recv.read_int()?; // mount
        recv.skip(61)?;

        let job = recv.read_short()?;
        let look = parse_look(recv)?;

        // Item count, item effect, chair
        recv.read_int()?;
        recv.read_int()?;
        recv.read_int()?;

        let position = recv.read_point()?;
        let stance = recv.read_byte()?;
        recv.skip(3)?;

        let mut pets = Vec::with_capacity(MAX_PETS);
        for _ in 0..MAX_PETS {
            if recv.read_byte()? != 1 {
                break;
            }
            recv.read_byte()?;
            let item_id = recv.read_int()?;
            let name = recv.read_string()?;
            let unique_id = recv.read_int()?;
            recv.read_int()?;
            pets.push(PetEntry {
                item_id,
                name,
                unique_id,
                position: recv.read_point()?,
                stance: recv.read_byte()?,
                foothold: recv.read_int()?,
            });
        }

        // Mount level, exp, tiredness
        recv.read_int()?;
        recv.read_int()?;
        recv.read_int()?;

        recv.read_byte()?; // player shop

        let chalkboard = if recv.read_bool()? {
            Some(recv.read_string()?)
        } else {
            None
        };

        recv.skip(3)?;
        recv.read_byte()?; // team

        world.spawn_character(CharSpawn {
            id,
            level,
            name,
            job,
            look,
            buff_value,
            morphed,
            position,
            stance,
            pets,
            chalkboard,
        });
        Ok(())
    }
}

pub struct RemoveCharHandler;

impl PacketHandler for RemoveCharHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let id = recv.read_int()?;
        world.remove_character(id);
        Ok(())
    }
}

/// Summon (mode 1) or dismiss (mode 0) a character's pet
pub struct SpawnPetHandler;

impl PacketHandler for SpawnPetHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let owner = recv.read_int()?;
        let index = recv.read_ubyte()?;
        let mode = recv.read_byte()?;

        match mode {
            1 => {
                recv.skip(1)?;
                let item_id = recv.read_int()?;
                let name = recv.read_string()?;
                let unique_id = recv.read_int()?;
                recv.skip(4)?;

                world.spawn_pet(
                    owner,
                    PetSpawn {
                        index,
                        item_id,
                        name,
                        unique_id,
                        position: recv.read_point()?,
                        stance: recv.read_ubyte()?,
                        foothold: recv.read_int()?,
                    },
                );
            }
            0 => {
                let hunger = recv.read_bool()?;
                world.remove_pet(owner, index, hunger);
            }
            _ => debug!(owner = owner, mode = mode, "Ignoring pet mode"),
        }
        Ok(())
    }
}

pub struct CharMovedHandler;

impl PacketHandler for CharMovedHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let id = recv.read_int()?;
        recv.skip(4)?;
        let movements = parse_movements(recv)?;
        world.send_movement(id, movements);
        Ok(())
    }
}

pub struct UpdateCharLookHandler;

impl PacketHandler for UpdateCharLookHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let id = recv.read_int()?;
        recv.read_byte()?;
        let look = parse_look(recv)?;
        world.update_look(id, look);
        Ok(())
    }
}

/// Effect on another character
///
/// The skill-buff branch is taken on any other code only while bytes
/// remain; with nothing left the packet is dropped without a world call.
pub struct ShowForeignEffectHandler;

impl PacketHandler for ShowForeignEffectHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let id = recv.read_int()?;
        let effect = recv.read_byte()?;

        let shown = match effect {
            ForeignEffect::RECOVERY_CODE => ForeignEffect::Recovery {
                amount: recv.read_ubyte()?,
            },
            ForeignEffect::MONSTER_CARD_CODE => ForeignEffect::MonsterCard,
            _ if recv.has_remaining() => {
                let skill_id = recv.read_int()?;
                recv.read_byte()?; // direction
                ForeignEffect::SkillBuff { skill_id, effect }
            }
            _ => {
                debug!(character = id, effect = effect, "Dropping bare foreign effect");
                return Ok(());
            }
        };

        world.show_foreign_effect(id, shown);
        Ok(())
    }
}

// ============ Mobs ============

/// Fields shared by both mob spawn packets, starting at the mob id
fn read_mob_spawn(
    recv: &mut InPacket<'_>,
    oid: i32,
    control: i8,
) -> Result<MobSpawn, PacketError> {
    let id = recv.read_int()?;
    recv.skip(22)?;

    let position = recv.read_point()?;
    let stance = recv.read_byte()?;
    recv.skip(2)?;
    let foothold = recv.read_ushort()?;

    let effect = recv.read_byte()?;
    if effect > 0 {
        recv.read_byte()?;
        recv.read_short()?;
        if effect == MOB_EFFECT_EXTENDED {
            recv.read_byte()?;
        }
    }

    let team = recv.read_byte()?;
    recv.skip(4)?;

    Ok(MobSpawn {
        oid,
        id,
        control,
        stance,
        foothold,
        new_spawn: effect == MOB_EFFECT_NEW_SPAWN,
        team,
        position,
    })
}

pub struct SpawnMobHandler;

impl PacketHandler for SpawnMobHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let oid = recv.read_int()?;
        recv.read_byte()?; // 5 when the mob has no controller
        let record = read_mob_spawn(recv, oid, 0)?;
        world.spawn_mob(record);
        Ok(())
    }
}

pub struct KillMobHandler;

impl PacketHandler for KillMobHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let oid = recv.read_int()?;
        let animation = recv.read_byte()?;
        world.remove_mob(oid, animation);
        Ok(())
    }
}

/// Mode 0 gives control of the mob up. Any other mode spawns it under this
/// client's control, unless the payload ends right after the object id.
pub struct SpawnMobControllerHandler;

impl PacketHandler for SpawnMobControllerHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let mode = recv.read_byte()?;
        let oid = recv.read_int()?;

        if mode == 0 {
            world.set_mob_control(oid, false);
        } else if recv.has_remaining() {
            recv.skip(1)?;
            let record = read_mob_spawn(recv, oid, mode)?;
            world.spawn_mob(record);
        } else {
            debug!(oid = oid, mode = mode, "Mob controller packet without spawn data");
        }
        Ok(())
    }
}

pub struct MobMovedHandler;

impl PacketHandler for MobMovedHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let oid = recv.read_int()?;
        // Skill usage flags
        recv.skip(7)?;
        let position = recv.read_point()?;
        let movements = parse_movements(recv)?;
        world.send_mob_movement(oid, position, movements);
        Ok(())
    }
}

pub struct ShowMobHpHandler;

impl PacketHandler for ShowMobHpHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let oid = recv.read_int()?;
        let hp_percent = recv.read_byte()?;
        world.show_mob_hp(oid, hp_percent);
        Ok(())
    }
}

// ============ NPCs ============

fn read_npc_spawn(recv: &mut InPacket<'_>, oid: i32) -> Result<NpcSpawn, PacketError> {
    let id = recv.read_int()?;
    let position = recv.read_point()?;
    let flip = recv.read_bool()?;
    let foothold = recv.read_ushort()?;

    // Horizontal movement range
    recv.read_short()?;
    recv.read_short()?;

    Ok(NpcSpawn {
        oid,
        id,
        position,
        flip,
        foothold,
    })
}

pub struct SpawnNpcHandler;

impl PacketHandler for SpawnNpcHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let oid = recv.read_int()?;
        let record = read_npc_spawn(recv, oid)?;
        world.spawn_npc(record);
        Ok(())
    }
}

/// Mode 0 removes the NPC, any other mode spawns it
pub struct SpawnNpcControllerHandler;

impl PacketHandler for SpawnNpcControllerHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let mode = recv.read_byte()?;
        let oid = recv.read_int()?;

        if mode == 0 {
            world.remove_npc(oid);
        } else {
            let record = read_npc_spawn(recv, oid)?;
            recv.read_bool()?; // shown on minimap
            world.spawn_npc(record);
        }
        Ok(())
    }
}

// ============ Drops ============

pub struct DropLootHandler;

impl PacketHandler for DropLootHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let mode = recv.read_byte()?;
        let oid = recv.read_int()?;
        let meso = recv.read_bool()?;
        let id = recv.read_int()?;
        let owner = recv.read_int()?;
        let pickup_type = recv.read_byte()?;
        let drop_to = recv.read_point()?;
        recv.skip(4)?;

        let drop_from = if mode == DROP_MODE_IN_PLACE {
            drop_to
        } else {
            let from = recv.read_point()?;
            recv.skip(2)?;
            from
        };

        if !meso {
            // Item expiration
            recv.skip(8)?;
        }
        let player_drop = !recv.read_bool()?;

        world.spawn_drop(DropSpawn {
            oid,
            id,
            meso,
            owner,
            drop_from,
            drop_to,
            pickup_type,
            mode,
            player_drop,
        });
        Ok(())
    }
}

/// Modes above 1 name a looter: the character, or one of its pets when a
/// trailing pet index byte is present.
pub struct RemoveLootHandler;

impl PacketHandler for RemoveLootHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let mode = recv.read_byte()?;
        let oid = recv.read_int()?;

        let looter = if mode > 1 {
            let owner = recv.read_int()?;
            if recv.has_remaining() {
                Looter::Pet {
                    owner,
                    index: recv.read_ubyte()?,
                }
            } else {
                Looter::Character(owner)
            }
        } else {
            Looter::Nobody
        };

        world.remove_drop(oid, mode, looter);
        Ok(())
    }
}

// ============ Reactors ============

pub struct SpawnReactorHandler;

impl PacketHandler for SpawnReactorHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let oid = recv.read_int()?;
        let id = recv.read_int()?;
        let state = recv.read_byte()?;
        let position = recv.read_point()?;

        world.spawn_reactor(ReactorSpawn {
            oid,
            id,
            state,
            position,
        });
        Ok(())
    }
}

pub struct RemoveReactorHandler;

impl PacketHandler for RemoveReactorHandler {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError> {
        let oid = recv.read_int()?;
        let state = recv.read_byte()?;
        let position = recv.read_point()?;
        world.remove_reactor(oid, state, position);
        Ok(())
    }
}
