//! Movement path sub-record
//!
//! A `u8` fragment count followed by that many fragments. Each fragment
//! starts with a command byte that decides its shape.

use crate::error::PacketError;
use crate::game::records::{Movement, MovementKind, Point};
use crate::net::buffer::InPacket;

/// Read a movement path
pub fn parse_movements(recv: &mut InPacket<'_>) -> Result<Vec<Movement>, PacketError> {
    let count = recv.read_ubyte()?;
    let mut movements = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        movements.push(parse_fragment(recv)?);
    }
    Ok(movements)
}

fn parse_fragment(recv: &mut InPacket<'_>) -> Result<Movement, PacketError> {
    let command = recv.read_ubyte()?;
    let mut movement = Movement {
        command,
        kind: MovementKind::None,
        position: Point::default(),
        last_position: Point::default(),
        foothold: 0,
        new_state: 0,
        duration: 0,
    };

    match command {
        0 | 5 | 15 | 17 => {
            movement.kind = MovementKind::Absolute;
            movement.position = recv.read_point()?;
            movement.last_position = recv.read_point()?;
            if command == 15 {
                recv.skip(2)?;
            }
            movement.foothold = recv.read_ushort()?;
            read_state(recv, &mut movement)?;
        }
        1 | 2 | 6 | 12 | 13 | 16 => {
            movement.kind = MovementKind::Relative;
            movement.position = recv.read_point()?;
            read_state(recv, &mut movement)?;
        }
        3 | 4 | 7 | 8 | 9 | 14 => {
            movement.kind = MovementKind::Teleport;
            movement.position = recv.read_point()?;
            movement.last_position = recv.read_point()?;
            read_state(recv, &mut movement)?;
        }
        10 => {
            // Equip change, one byte of no positional meaning
            recv.skip(1)?;
        }
        11 => {
            movement.kind = MovementKind::Chair;
            movement.position = recv.read_point()?;
            movement.foothold = recv.read_ushort()?;
            read_state(recv, &mut movement)?;
        }
        _ => {}
    }

    Ok(movement)
}

fn read_state(recv: &mut InPacket<'_>, movement: &mut Movement) -> Result<(), PacketError> {
    movement.new_state = recv.read_ubyte()?;
    movement.duration = recv.read_ushort()?;
    Ok(())
}
