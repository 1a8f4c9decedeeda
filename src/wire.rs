//! The 32-byte request/reply datagram exchanged between client and server.

use crate::error::ParseError;

pub const MAGIC: u32 = 0x7466_7264; // 'drft'
pub const FLAG_REPLY: u32 = 1 << 0;
pub const SIZE: usize = 32;
pub const DEFAULT_PORT: u16 = 4318;

/// A single request or reply datagram.
///
/// `local` carries the client's send-time through the round trip unchanged;
/// the server fills in `remote` and sets [`FLAG_REPLY`] before echoing it
/// back. All fields are little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub flags: u32,
    pub local: i64,
    pub remote: i64,
}

impl Packet {
    pub fn request(local: i64) -> Self {
        Packet {
            flags: 0,
            local,
            remote: 0,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.flags & FLAG_REPLY != 0
    }

    pub fn into_reply(mut self, remote: i64) -> Self {
        self.flags |= FLAG_REPLY;
        self.remote = remote;
        self
    }

    pub fn to_bytes(self) -> [u8; SIZE] {
        let mut buf = [0u8; SIZE];
        buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&self.flags.to_le_bytes());
        buf[8..16].copy_from_slice(&self.local.to_le_bytes());
        buf[16..24].copy_from_slice(&self.remote.to_le_bytes());
        buf[24..32].copy_from_slice(&0u64.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < SIZE {
            return Err(ParseError::TooShort {
                got: buf.len(),
                want: SIZE,
            });
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != MAGIC {
            return Err(ParseError::BadMagic { got: magic, want: MAGIC });
        }
        let flags = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let local = i64::from_le_bytes(buf[8..16].try_into().unwrap());
        let remote = i64::from_le_bytes(buf[16..24].try_into().unwrap());
        Ok(Packet {
            flags,
            local,
            remote,
        })
    }
}
