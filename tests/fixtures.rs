#![allow(dead_code)]
use byteorder::{LittleEndian, WriteBytesExt};
use ed25519_dalek::{Signer, SigningKey};
use sardemo::checksum::{V2_CHECKSUM_TRAILER, v2_signed_message};

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}

pub const MAP_NAME: &str = "sp_a1_intro1";
pub const PLAYER_NAME: &str = "nekz";
pub const PLAYBACK_TICKS: i32 = 1234;

/// Key used to sign v2 checksums in tests.
pub fn test_signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42; 32])
}

pub fn test_public_key() -> [u8; 32] {
    test_signing_key().verifying_key().to_bytes()
}

fn write_fixed_string(out: &mut Vec<u8>, value: &str) {
    let mut field = [0u8; 260];
    field[..value.len()].copy_from_slice(value.as_bytes());
    out.extend_from_slice(&field);
}

/// A SAR payload: tag byte followed by the given fields.
pub fn sar_payload(tag: u8, fields: &[&[u8]]) -> Vec<u8> {
    let mut out = vec![tag];
    for field in fields {
        out.extend_from_slice(field);
    }
    out
}

/// Writes a protocol 4 demo, message by message.
pub struct DemoBuilder {
    buf: Vec<u8>,
    tick: i32,
}

impl DemoBuilder {
    pub fn new() -> Self {
        Self::with_protocol(4)
    }

    pub fn with_protocol(demo_protocol: i32) -> Self {
        let mut buf = Vec::with_capacity(2048);
        buf.extend_from_slice(b"HL2DEMO\x00");
        buf.write_i32::<LittleEndian>(demo_protocol).unwrap();
        buf.write_i32::<LittleEndian>(2001).unwrap();
        write_fixed_string(&mut buf, "localhost:27015");
        write_fixed_string(&mut buf, PLAYER_NAME);
        write_fixed_string(&mut buf, MAP_NAME);
        write_fixed_string(&mut buf, "portal2");
        buf.write_f32::<LittleEndian>(PLAYBACK_TICKS as f32 / 60.0).unwrap();
        buf.write_i32::<LittleEndian>(PLAYBACK_TICKS).unwrap();
        buf.write_i32::<LittleEndian>(PLAYBACK_TICKS).unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();

        DemoBuilder { buf, tick: 0 }
    }

    fn protocol(&self) -> i32 {
        i32::from_le_bytes([self.buf[8], self.buf[9], self.buf[10], self.buf[11]])
    }

    fn message_header(&mut self, message_type: u8) {
        self.buf.write_u8(message_type).unwrap();
        self.buf.write_i32::<LittleEndian>(self.tick).unwrap();
        if self.protocol() >= 4 {
            self.buf.write_u8(0).unwrap();
        }
    }

    fn sized(&mut self, data: &[u8]) {
        self.buf.write_i32::<LittleEndian>(data.len() as i32).unwrap();
        self.buf.extend_from_slice(data);
    }

    pub fn tick(mut self, tick: i32) -> Self {
        self.tick = tick;
        self
    }

    pub fn sync_tick(mut self) -> Self {
        self.message_header(3);
        self
    }

    pub fn packet(mut self, data: &[u8]) -> Self {
        self.message_header(2);
        let cmd_infos = if self.protocol() >= 4 { 2 } else { 1 };
        self.buf.extend(std::iter::repeat_n(0u8, 76 * cmd_infos));
        self.buf.write_i32::<LittleEndian>(1).unwrap();
        self.buf.write_i32::<LittleEndian>(2).unwrap();
        self.sized(data);
        self
    }

    pub fn console_cmd(mut self, command: &str) -> Self {
        self.message_header(4);
        let mut data = command.as_bytes().to_vec();
        data.push(0);
        self.sized(&data);
        self
    }

    pub fn user_cmd(mut self, data: &[u8]) -> Self {
        self.message_header(5);
        self.buf.write_i32::<LittleEndian>(7).unwrap();
        self.sized(data);
        self
    }

    pub fn custom_data(mut self, unknown: i32, data: &[u8]) -> Self {
        self.message_header(8);
        self.buf.write_i32::<LittleEndian>(unknown).unwrap();
        self.sized(data);
        self
    }

    /// A SAR payload as SAR writes it: custom data with a zero callback index.
    pub fn sar(self, payload: &[u8]) -> Self {
        self.custom_data(0, payload)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn stop(mut self) -> Self {
        self.message_header(7);
        self
    }

    /// Appends a record after the stop message, as SAR does once recording ends.
    pub fn trailing_record(mut self, declared_len: u32, payload: &[u8]) -> Self {
        self.buf.write_u8(8).unwrap();
        self.buf.write_i32::<LittleEndian>(self.tick).unwrap();
        self.buf.write_u8(0).unwrap();
        self.buf.write_i32::<LittleEndian>(0).unwrap();
        self.buf.write_u32::<LittleEndian>(declared_len).unwrap();
        self.buf.extend_from_slice(payload);
        self
    }

    pub fn legacy_checksum(self, demo_sum: u32, sar_sum: u32) -> Self {
        let payload = sar_payload(
            0xFF,
            &[&demo_sum.to_le_bytes(), &sar_sum.to_le_bytes()],
        );
        self.trailing_record(payload.len() as u32, &payload)
    }

    /// Appends a v2 checksum record with an all-zero signature, see [`sign_v2`].
    pub fn v2_checksum(self, sar_sum: u32) -> Self {
        let payload = sar_payload(0xFE, &[&sar_sum.to_le_bytes(), &[0u8; 64]]);
        self.trailing_record(payload.len() as u32, &payload)
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for DemoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Signs a demo built with [`DemoBuilder::v2_checksum`] in place.
pub fn sign_v2(demo: &mut [u8], key: &SigningKey, sar_sum: u32) {
    assert!(demo.len() > V2_CHECKSUM_TRAILER);
    let signature = key.sign(&v2_signed_message(demo, sar_sum));
    let len = demo.len();
    demo[len - 64..].copy_from_slice(&signature.to_bytes());
}

/// Header, a sync tick and a stop message.
pub fn minimal_demo() -> Vec<u8> {
    DemoBuilder::new().sync_tick().stop().build()
}
