//! Client half of the MySQL connection phase
//!
//! The probe only ever acts as a client: it parses the server's initial
//! handshake, answers with a handshake response carrying the
//! mysql_native_password scramble, and classifies the server's reply.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use super::packet::{capabilities::*, Packet};

/// MySQL initial handshake packet (server -> client)
#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub auth_plugin_data_part1: [u8; 8],
    pub capability_flags: u32,
    pub character_set: u8,
    pub status_flags: u16,
    pub auth_plugin_data_part2: Vec<u8>,
    pub auth_plugin_name: String,
}

impl InitialHandshake {
    /// Get full auth plugin data (20 bytes)
    pub fn auth_plugin_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(20);
        data.extend_from_slice(&self.auth_plugin_data_part1);
        data.extend_from_slice(&self.auth_plugin_data_part2);
        data
    }

    /// Parse from packet payload
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 32 {
            return None;
        }

        let mut buf = payload;

        let protocol_version = buf.get_u8();

        // Server version (null-terminated string)
        let null_pos = buf.iter().position(|&b| b == 0)?;
        let server_version = String::from_utf8_lossy(&buf[..null_pos]).to_string();
        buf.advance(null_pos + 1);

        if buf.len() < 32 {
            return None;
        }

        let connection_id = buf.get_u32_le();

        let mut auth_plugin_data_part1 = [0u8; 8];
        auth_plugin_data_part1.copy_from_slice(&buf[..8]);
        buf.advance(8);

        // Filler
        buf.advance(1);

        let capability_flags_lower = buf.get_u16_le() as u32;
        let character_set = buf.get_u8();
        let status_flags = buf.get_u16_le();
        let capability_flags_upper = buf.get_u16_le() as u32;
        let capability_flags = capability_flags_lower | (capability_flags_upper << 16);

        let auth_plugin_data_len = buf.get_u8();

        // Reserved
        buf.advance(10);

        // Auth plugin data part 2
        let mut auth_plugin_data_part2 = Vec::new();
        if capability_flags & CLIENT_SECURE_CONNECTION != 0 {
            let len = std::cmp::max(13, auth_plugin_data_len.saturating_sub(8) as usize);
            if buf.len() < len {
                return None;
            }
            let data_len = buf.iter().take(len).position(|&b| b == 0).unwrap_or(len);
            auth_plugin_data_part2.extend_from_slice(&buf[..data_len]);
            buf.advance(len);
        }

        // Auth plugin name
        let auth_plugin_name = if capability_flags & CLIENT_PLUGIN_AUTH != 0 && !buf.is_empty() {
            let null_pos = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            String::from_utf8_lossy(&buf[..null_pos]).to_string()
        } else {
            "mysql_native_password".to_string()
        };

        Some(Self {
            protocol_version,
            server_version,
            connection_id,
            auth_plugin_data_part1,
            capability_flags,
            character_set,
            status_flags,
            auth_plugin_data_part2,
            auth_plugin_name,
        })
    }
}

/// MySQL handshake response packet (client -> server)
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    pub capability_flags: u32,
    pub max_packet_size: u32,
    pub character_set: u8,
    pub username: String,
    pub auth_response: Vec<u8>,
    pub auth_plugin_name: String,
}

impl HandshakeResponse {
    /// Encode to packet
    pub fn encode(&self, sequence_id: u8) -> Packet {
        let mut buf = BytesMut::new();

        buf.put_u32_le(self.capability_flags);
        buf.put_u32_le(self.max_packet_size);
        buf.put_u8(self.character_set);

        // Reserved (23 bytes)
        buf.extend_from_slice(&[0u8; 23]);

        // Username
        buf.extend_from_slice(self.username.as_bytes());
        buf.put_u8(0);

        // Auth response (length-prefixed)
        if self.capability_flags & CLIENT_SECURE_CONNECTION != 0 {
            buf.put_u8(self.auth_response.len() as u8);
            buf.extend_from_slice(&self.auth_response);
        } else {
            buf.extend_from_slice(&self.auth_response);
            buf.put_u8(0);
        }

        // Auth plugin name
        if self.capability_flags & CLIENT_PLUGIN_AUTH != 0 {
            buf.extend_from_slice(self.auth_plugin_name.as_bytes());
            buf.put_u8(0);
        }

        Packet::new(sequence_id, buf.freeze())
    }
}

/// Compute mysql_native_password auth response
pub fn compute_auth_response(password: &str, auth_data: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    // SHA1(password)
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let hash1 = hasher.finalize();

    // SHA1(SHA1(password))
    let mut hasher = Sha1::new();
    hasher.update(&hash1);
    let hash2 = hasher.finalize();

    // SHA1(auth_data + SHA1(SHA1(password)))
    let mut hasher = Sha1::new();
    hasher.update(auth_data);
    hasher.update(&hash2);
    let hash3 = hasher.finalize();

    // XOR SHA1(password) with SHA1(auth_data + SHA1(SHA1(password)))
    hash1
        .iter()
        .zip(hash3.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

/// ERR packet
#[derive(Debug, Clone)]
pub struct ErrPacket {
    pub error_code: u16,
    pub sql_state: String,
    pub error_message: String,
}

impl ErrPacket {
    /// Parse from packet payload
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.is_empty() || payload[0] != 0xFF {
            return None;
        }

        let mut buf = &payload[1..];
        if buf.len() < 2 {
            return None;
        }

        let error_code = buf.get_u16_le();

        let (sql_state, error_message) = if !buf.is_empty() && buf[0] == b'#' {
            buf.advance(1);
            if buf.len() >= 5 {
                let sql_state = String::from_utf8_lossy(&buf[..5]).to_string();
                buf.advance(5);
                let error_message = String::from_utf8_lossy(buf).to_string();
                (sql_state, error_message)
            } else {
                ("HY000".to_string(), String::from_utf8_lossy(buf).to_string())
            }
        } else {
            ("HY000".to_string(), String::from_utf8_lossy(buf).to_string())
        };

        Some(Self {
            error_code,
            sql_state,
            error_message,
        })
    }
}

/// Check if packet is OK packet
pub fn is_ok_packet(payload: &Bytes) -> bool {
    !payload.is_empty() && payload[0] == 0x00
}

/// Check if packet is ERR packet
pub fn is_err_packet(payload: &Bytes) -> bool {
    !payload.is_empty() && payload[0] == 0xFF
}

/// Check if packet is EOF packet
pub fn is_eof_packet(payload: &Bytes) -> bool {
    !payload.is_empty() && payload[0] == 0xFE && payload.len() < 9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_response_empty_password() {
        assert!(compute_auth_response("", &[1u8; 20]).is_empty());
    }

    #[test]
    fn test_auth_response_is_scramble_sized() {
        let out = compute_auth_response("secret", &[7u8; 20]);
        assert_eq!(out.len(), 20);
        // Different nonce, different scramble
        let other = compute_auth_response("secret", &[8u8; 20]);
        assert_ne!(out, other);
    }

    #[test]
    fn test_err_packet_parse_with_sql_state() {
        let mut payload = vec![0xFF, 0x15, 0x04]; // code 1045
        payload.push(b'#');
        payload.extend_from_slice(b"28000");
        payload.extend_from_slice(b"Access denied for user 'nagios'");

        let err = ErrPacket::parse(&payload).expect("ERR packet");
        assert_eq!(err.error_code, 1045);
        assert_eq!(err.sql_state, "28000");
        assert_eq!(err.error_message, "Access denied for user 'nagios'");
    }

    #[test]
    fn test_err_packet_rejects_other_headers() {
        assert!(ErrPacket::parse(&[0x00, 0x00, 0x00]).is_none());
        assert!(ErrPacket::parse(&[]).is_none());
    }

    #[test]
    fn test_packet_classification() {
        assert!(is_ok_packet(&Bytes::from_static(&[0x00, 0x00, 0x00])));
        assert!(is_err_packet(&Bytes::from_static(&[0xFF, 0x15, 0x04])));
        assert!(is_eof_packet(&Bytes::from_static(&[0xFE, 0x00, 0x00, 0x02, 0x00])));
        // A length-encoded 0xFE integer header is not an EOF packet
        assert!(!is_eof_packet(&Bytes::from_static(&[
            0xFE, 1, 2, 3, 4, 5, 6, 7, 8, 9
        ])));
    }
}
