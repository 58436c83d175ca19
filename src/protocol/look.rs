//! Character look sub-record
//!
//! Shared by the spawn-character and update-look handlers.
//!
//! ```text
//! bool female, u8 skin, i32 face, bool megaphone, i32 hair
//! (u8 slot, i32 item)* 0xFF      visible equips
//! (u8 slot, i32 item)* 0xFF      masked equips
//! i32 cash weapon
//! i32 pet id x3
//! ```

use crate::error::PacketError;
use crate::game::records::LookEntry;
use crate::net::buffer::InPacket;

/// Terminates each equip list
const SLOT_LIST_END: u8 = 0xFF;

/// Read a look entry
pub fn parse_look(recv: &mut InPacket<'_>) -> Result<LookEntry, PacketError> {
    let mut look = LookEntry {
        female: recv.read_bool()?,
        skin: recv.read_ubyte()?,
        face_id: recv.read_int()?,
        ..LookEntry::default()
    };

    // Megaphone flag, not part of the look
    recv.skip(1)?;
    look.hair_id = recv.read_int()?;

    loop {
        let slot = recv.read_ubyte()?;
        if slot == SLOT_LIST_END {
            break;
        }
        look.equips.insert(slot, recv.read_int()?);
    }

    loop {
        let slot = recv.read_ubyte()?;
        if slot == SLOT_LIST_END {
            break;
        }
        look.masked_equips.insert(slot, recv.read_int()?);
    }

    look.cash_weapon = recv.read_int()?;
    for pet_id in look.pet_ids.iter_mut() {
        *pet_id = recv.read_int()?;
    }

    Ok(look)
}
