use bytes::{Buf, BufMut, Bytes, BytesMut};

/// MySQL packet header size: 3 bytes length + 1 byte sequence
pub const PACKET_HEADER_SIZE: usize = 4;

/// MySQL wire protocol packet
#[derive(Debug, Clone)]
pub struct Packet {
    pub sequence_id: u8,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(sequence_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_id,
            payload: payload.into(),
        }
    }

    /// Build a command packet (command byte + argument), sequence id 0
    pub fn command(command: u8, arg: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(1 + arg.len());
        payload.push(command);
        payload.extend_from_slice(arg);
        Self::new(0, payload)
    }

    /// Encode packet to bytes (header + payload)
    pub fn encode(&self, dst: &mut BytesMut) {
        let len = self.payload.len();
        // 3 bytes for length (little endian)
        dst.put_u8((len & 0xFF) as u8);
        dst.put_u8(((len >> 8) & 0xFF) as u8);
        dst.put_u8(((len >> 16) & 0xFF) as u8);
        // 1 byte for sequence id
        dst.put_u8(self.sequence_id);
        // Payload
        dst.extend_from_slice(&self.payload);
    }

    /// Try to decode packet from bytes, returns None if not enough data
    pub fn decode(src: &mut BytesMut) -> Option<Self> {
        if src.len() < PACKET_HEADER_SIZE {
            return None;
        }

        // Read length (3 bytes, little endian)
        let len = src[0] as usize | ((src[1] as usize) << 8) | ((src[2] as usize) << 16);

        let total_len = PACKET_HEADER_SIZE + len;
        if src.len() < total_len {
            return None;
        }

        // Read sequence id
        let sequence_id = src[3];

        // Advance past header
        src.advance(PACKET_HEADER_SIZE);

        // Read payload
        let payload = src.split_to(len).freeze();

        Some(Self {
            sequence_id,
            payload,
        })
    }
}

/// Commands the probe sends (client side of the text protocol only)
pub mod commands {
    pub const COM_QUIT: u8 = 0x01;
    pub const COM_QUERY: u8 = 0x03;
}

/// MySQL capability flags
#[allow(dead_code)]
pub mod capabilities {
    pub const CLIENT_LONG_PASSWORD: u32 = 1;
    pub const CLIENT_LONG_FLAG: u32 = 1 << 2;
    pub const CLIENT_CONNECT_WITH_DB: u32 = 1 << 3;
    pub const CLIENT_PROTOCOL_41: u32 = 1 << 9;
    pub const CLIENT_TRANSACTIONS: u32 = 1 << 14;
    pub const CLIENT_SECURE_CONNECTION: u32 = 1 << 15;
    pub const CLIENT_PLUGIN_AUTH: u32 = 1 << 19;
    pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 1 << 21;
    pub const CLIENT_DEPRECATE_EOF: u32 = 1 << 24;

    /// Capabilities the probe advertises
    ///
    /// Note: CLIENT_DEPRECATE_EOF is intentionally NOT included because some
    /// MySQL backends advertise support but don't actually implement it
    /// properly, still sending EOF packets despite negotiating deprecation.
    /// The result-set decoder tolerates both framings anyway.
    pub const DEFAULT_CAPABILITIES: u32 = CLIENT_LONG_PASSWORD
        | CLIENT_LONG_FLAG
        | CLIENT_PROTOCOL_41
        | CLIENT_TRANSACTIONS
        | CLIENT_SECURE_CONNECTION
        | CLIENT_PLUGIN_AUTH;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_waits_for_full_packet() {
        let mut buf = BytesMut::new();
        // Header says 5 payload bytes, only 2 present
        buf.extend_from_slice(&[0x05, 0x00, 0x00, 0x00, 0x01, 0x02]);
        assert!(Packet::decode(&mut buf).is_none());
        // Nothing consumed while incomplete
        assert_eq!(buf.len(), 6);

        buf.extend_from_slice(&[0x03, 0x04, 0x05]);
        let packet = Packet::decode(&mut buf).expect("complete packet");
        assert_eq!(packet.sequence_id, 0);
        assert_eq!(&packet.payload[..], &[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_command_packet_layout() {
        let packet = Packet::command(commands::COM_QUERY, b"SHOW MASTER STATUS");
        assert_eq!(packet.sequence_id, 0);
        assert_eq!(packet.payload[0], 0x03);
        assert_eq!(&packet.payload[1..], b"SHOW MASTER STATUS");
    }
}
