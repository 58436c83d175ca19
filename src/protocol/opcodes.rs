//! Opcode tables
//!
//! Receive opcodes identify server -> client payloads and pick the handler.
//! Send opcodes identify client -> server payloads.

/// Server -> client opcodes with a registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecvOpcode {
    SpawnChar = 160,
    RemoveChar = 161,
    SpawnPet = 168,
    CharMoved = 185,
    UpdateCharLook = 197,
    ShowForeignEffect = 198,
    SpawnMob = 236,
    KillMob = 237,
    /// Spawn a mob under this client's control, or give control up
    SpawnMobController = 238,
    MobMoved = 239,
    ShowMobHp = 250,
    SpawnNpc = 257,
    /// Spawn an NPC under this client's control, or remove it
    SpawnNpcController = 259,
    DropLoot = 268,
    RemoveLoot = 269,
    SpawnReactor = 279,
    RemoveReactor = 280,
}

impl RecvOpcode {
    /// Every receive opcode, in ascending order
    pub const ALL: [RecvOpcode; 17] = [
        Self::SpawnChar,
        Self::RemoveChar,
        Self::SpawnPet,
        Self::CharMoved,
        Self::UpdateCharLook,
        Self::ShowForeignEffect,
        Self::SpawnMob,
        Self::KillMob,
        Self::SpawnMobController,
        Self::MobMoved,
        Self::ShowMobHp,
        Self::SpawnNpc,
        Self::SpawnNpcController,
        Self::DropLoot,
        Self::RemoveLoot,
        Self::SpawnReactor,
        Self::RemoveReactor,
    ];

    /// Convert a u16 to a RecvOpcode
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_u16() == value)
    }

    /// Get the opcode value
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the name of this opcode
    pub fn name(&self) -> &'static str {
        match self {
            Self::SpawnChar => "SpawnChar",
            Self::RemoveChar => "RemoveChar",
            Self::SpawnPet => "SpawnPet",
            Self::CharMoved => "CharMoved",
            Self::UpdateCharLook => "UpdateCharLook",
            Self::ShowForeignEffect => "ShowForeignEffect",
            Self::SpawnMob => "SpawnMob",
            Self::KillMob => "KillMob",
            Self::SpawnMobController => "SpawnMobController",
            Self::MobMoved => "MobMoved",
            Self::ShowMobHp => "ShowMobHp",
            Self::SpawnNpc => "SpawnNpc",
            Self::SpawnNpcController => "SpawnNpcController",
            Self::DropLoot => "DropLoot",
            Self::RemoveLoot => "RemoveLoot",
            Self::SpawnReactor => "SpawnReactor",
            Self::RemoveReactor => "RemoveReactor",
        }
    }
}

impl std::fmt::Display for RecvOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u16())
    }
}

impl From<RecvOpcode> for u16 {
    fn from(opcode: RecvOpcode) -> u16 {
        opcode.as_u16()
    }
}

/// Client -> server opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SendOpcode {
    GeneralChat = 49,
}

impl SendOpcode {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            49 => Some(Self::GeneralChat),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GeneralChat => "GeneralChat",
        }
    }
}

impl std::fmt::Display for SendOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u16())
    }
}

impl From<SendOpcode> for u16 {
    fn from(opcode: SendOpcode) -> u16 {
        opcode.as_u16()
    }
}
