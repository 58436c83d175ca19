//! Packet buffers
//!
//! [`InPacket`] is a read cursor over one decrypted payload. It borrows the
//! framer's reassembly buffer and lives only as long as the handler call.
//! [`OutPacket`] builds an outgoing payload, opcode first.
//!
//! All integers are little-endian. Strings carry a `u16` length prefix.
//! Every read checks the remaining length and fails with
//! [`PacketError::InsufficientData`] instead of reading past the end.

use bytes::{BufMut, BytesMut};

use crate::error::PacketError;
use crate::game::records::Point;

/// Read cursor over a decrypted payload
#[derive(Debug, Clone)]
pub struct InPacket<'a> {
    data: &'a [u8],
    read_pos: usize,
}

impl<'a> InPacket<'a> {
    /// Wrap a payload for reading
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, read_pos: 0 }
    }

    // ============ Properties ============

    /// Current read position
    #[inline]
    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    /// Total length of the payload
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Whether any bytes are left to read
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], PacketError> {
        if self.remaining() < count {
            return Err(PacketError::InsufficientData {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.read_pos..self.read_pos + count];
        self.read_pos += count;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], PacketError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    /// Skip `count` bytes whose layout is not interpreted
    pub fn skip(&mut self, count: usize) -> Result<(), PacketError> {
        self.take(count).map(|_| ())
    }

    // ============ Reading Methods ============

    /// Read a signed byte
    pub fn read_byte(&mut self) -> Result<i8, PacketError> {
        Ok(self.read_ubyte()? as i8)
    }

    /// Read an unsigned byte
    pub fn read_ubyte(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1)?[0])
    }

    /// Read a boolean (any non-zero byte is true)
    pub fn read_bool(&mut self) -> Result<bool, PacketError> {
        Ok(self.read_ubyte()? != 0)
    }

    /// Read a signed short (2 bytes)
    pub fn read_short(&mut self) -> Result<i16, PacketError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    /// Read an unsigned short (2 bytes)
    pub fn read_ushort(&mut self) -> Result<u16, PacketError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// Read a signed int (4 bytes)
    pub fn read_int(&mut self) -> Result<i32, PacketError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Read a signed long (8 bytes)
    pub fn read_long(&mut self) -> Result<i64, PacketError> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Read a 2D point (x then y, both signed shorts)
    pub fn read_point(&mut self) -> Result<Point, PacketError> {
        let x = self.read_short()?;
        let y = self.read_short()?;
        Ok(Point::new(x, y))
    }

    /// Read a length-prefixed string
    pub fn read_string(&mut self) -> Result<String, PacketError> {
        let length = self.read_ushort()? as usize;
        let bytes = self.take(length)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a specific number of raw bytes
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8], PacketError> {
        self.take(length)
    }
}

/// Outgoing payload builder
#[derive(Debug, Clone)]
pub struct OutPacket {
    data: BytesMut,
}

impl OutPacket {
    /// Start a payload with the given opcode
    pub fn new(opcode: impl Into<u16>) -> Self {
        let mut data = BytesMut::with_capacity(64);
        data.put_u16_le(opcode.into());
        Self { data }
    }

    /// Opcode this payload was started with
    pub fn opcode(&self) -> u16 {
        u16::from_le_bytes([self.data[0], self.data[1]])
    }

    /// Payload length including the opcode
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: a payload holds at least its opcode
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the payload bytes
    pub fn into_bytes(self) -> BytesMut {
        self.data
    }

    // ============ Writing Methods ============

    pub fn write_byte(&mut self, value: i8) -> &mut Self {
        self.data.put_i8(value);
        self
    }

    pub fn write_ubyte(&mut self, value: u8) -> &mut Self {
        self.data.put_u8(value);
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write_ubyte(u8::from(value))
    }

    pub fn write_short(&mut self, value: i16) -> &mut Self {
        self.data.put_i16_le(value);
        self
    }

    pub fn write_ushort(&mut self, value: u16) -> &mut Self {
        self.data.put_u16_le(value);
        self
    }

    pub fn write_int(&mut self, value: i32) -> &mut Self {
        self.data.put_i32_le(value);
        self
    }

    pub fn write_long(&mut self, value: i64) -> &mut Self {
        self.data.put_i64_le(value);
        self
    }

    pub fn write_point(&mut self, point: Point) -> &mut Self {
        self.write_short(point.x);
        self.write_short(point.y)
    }

    /// Write a length-prefixed string. Strings longer than `u16::MAX`
    /// bytes are truncated.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        let bytes = value.as_bytes();
        let length = bytes.len().min(u16::MAX as usize);
        self.data.put_u16_le(length as u16);
        self.data.extend_from_slice(&bytes[..length]);
        self
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Write `count` zero bytes
    pub fn write_padding(&mut self, count: usize) -> &mut Self {
        self.data.put_bytes(0, count);
        self
    }
}

impl AsRef<[u8]> for OutPacket {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_read_write() {
        let mut out = OutPacket::new(0x00A0u16);
        out.write_byte(-42)
            .write_ubyte(255)
            .write_short(-1234)
            .write_int(987654)
            .write_long(123456789012345)
            .write_bool(true);

        let bytes = out.into_bytes();
        let mut recv = InPacket::new(&bytes);

        assert_eq!(recv.read_ushort(), Ok(0x00A0));
        assert_eq!(recv.read_byte(), Ok(-42));
        assert_eq!(recv.read_ubyte(), Ok(255));
        assert_eq!(recv.read_short(), Ok(-1234));
        assert_eq!(recv.read_int(), Ok(987654));
        assert_eq!(recv.read_long(), Ok(123456789012345));
        assert_eq!(recv.read_bool(), Ok(true));
        assert!(!recv.has_remaining());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut out = OutPacket::new(0x0102u16);
        out.write_int(0x0A0B0C0D);

        assert_eq!(out.as_bytes(), &[0x02, 0x01, 0x0D, 0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn test_string() {
        let mut out = OutPacket::new(0u16);
        out.write_string("Hello, Maple!").write_string("");

        let bytes = out.into_bytes();
        assert_eq!(&bytes[2..4], &[13, 0]);

        let mut recv = InPacket::new(&bytes);
        recv.skip(2).unwrap();
        assert_eq!(recv.read_string().unwrap(), "Hello, Maple!");
        assert_eq!(recv.read_string().unwrap(), "");
    }

    #[test]
    fn test_point() {
        let mut out = OutPacket::new(0u16);
        out.write_point(Point::new(-120, 45));

        let bytes = out.into_bytes();
        let mut recv = InPacket::new(&bytes[2..]);
        assert_eq!(recv.read_point(), Ok(Point::new(-120, 45)));
    }

    #[test]
    fn test_insufficient_data() {
        let mut recv = InPacket::new(&[1, 2, 3]);

        assert_eq!(
            recv.read_int(),
            Err(PacketError::InsufficientData {
                needed: 4,
                remaining: 3
            })
        );
        // A failed read consumes nothing.
        assert_eq!(recv.remaining(), 3);
        assert_eq!(recv.read_short(), Ok(0x0201));
    }

    #[test]
    fn test_truncated_string() {
        // Length prefix says 10, only 2 bytes follow.
        let mut recv = InPacket::new(&[10, 0, b'h', b'i']);
        assert!(matches!(
            recv.read_string(),
            Err(PacketError::InsufficientData { needed: 10, .. })
        ));
    }

    #[test]
    fn test_skip_and_remaining() {
        let mut out = OutPacket::new(7u16);
        out.write_padding(5).write_ubyte(9);

        let bytes = out.into_bytes();
        let mut recv = InPacket::new(&bytes);
        assert_eq!(recv.remaining(), 8);

        recv.skip(7).unwrap();
        assert_eq!(recv.read_position(), 7);
        assert_eq!(recv.read_ubyte(), Ok(9));
        assert!(recv.skip(1).is_err());
    }

    #[test]
    fn test_opcode() {
        let out = OutPacket::new(268u16);
        assert_eq!(out.opcode(), 268);
        assert_eq!(out.len(), 2);
    }
}
