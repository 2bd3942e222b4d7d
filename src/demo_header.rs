use crate::err::{DecodeResultExt, DemoError, Result};
use crate::utils::ByteCursor;

use serde::Serialize;

pub const DEMO_HEADER_MAGIC: &[u8; 8] = b"HL2DEMO\x00";
pub const DEMO_HEADER_SIZE: usize = 1072;
const MAX_OSPATH: usize = 260;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoHeader {
    pub demo_protocol: i32,
    pub network_protocol: i32,
    pub server_name: String,
    pub client_name: String,
    pub map_name: String,
    pub game_directory: String,
    pub playback_time: f32,
    pub playback_ticks: i32,
    pub playback_frames: i32,
    pub signon_length: i32,
}

impl DemoHeader {
    pub fn from_cursor(cursor: &mut ByteCursor<'_>) -> Result<DemoHeader> {
        let magic = cursor.array::<8>("demo header magic").context("demo header")?;

        if &magic != DEMO_HEADER_MAGIC {
            return Err(DemoError::InvalidMagic { magic });
        }

        let demo_protocol = cursor.i32_named("demo protocol").context("demo header")?;
        let network_protocol = cursor.i32_named("network protocol").context("demo header")?;
        let server_name = cursor
            .fixed_ascii_string(MAX_OSPATH, "server name")
            .context("demo header")?;
        let client_name = cursor
            .fixed_ascii_string(MAX_OSPATH, "client name")
            .context("demo header")?;
        let map_name = cursor
            .fixed_ascii_string(MAX_OSPATH, "map name")
            .context("demo header")?;
        let game_directory = cursor
            .fixed_ascii_string(MAX_OSPATH, "game directory")
            .context("demo header")?;
        let playback_time = cursor.f32_named("playback time").context("demo header")?;
        let playback_ticks = cursor.i32_named("playback ticks").context("demo header")?;
        let playback_frames = cursor.i32_named("playback frames").context("demo header")?;
        let signon_length = cursor.i32_named("signon length").context("demo header")?;

        Ok(DemoHeader {
            demo_protocol,
            network_protocol,
            server_name,
            client_name,
            map_name,
            game_directory,
            playback_time,
            playback_ticks,
            playback_frames,
            signon_length,
        })
    }

    /// Demo protocol 4 (Portal 2 and later) tags every message with a split-screen slot.
    pub fn has_slots(&self) -> bool {
        self.demo_protocol >= 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(magic: &[u8; 8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(DEMO_HEADER_SIZE);
        out.extend_from_slice(magic);
        out.extend_from_slice(&4i32.to_le_bytes());
        out.extend_from_slice(&2001i32.to_le_bytes());
        for name in ["localhost:27015", "nekz", "sp_a1_intro1", "portal2"] {
            let mut field = [0u8; MAX_OSPATH];
            field[..name.len()].copy_from_slice(name.as_bytes());
            out.extend_from_slice(&field);
        }
        out.extend_from_slice(&12.5f32.to_le_bytes());
        out.extend_from_slice(&750i32.to_le_bytes());
        out.extend_from_slice(&749i32.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out
    }

    #[test]
    fn test_parses_demo_header() {
        let data = header_bytes(DEMO_HEADER_MAGIC);
        assert_eq!(data.len(), DEMO_HEADER_SIZE);

        let mut cursor = ByteCursor::new(&data);
        let header = DemoHeader::from_cursor(&mut cursor).unwrap();

        assert_eq!(cursor.pos(), DEMO_HEADER_SIZE);
        assert_eq!(
            header,
            DemoHeader {
                demo_protocol: 4,
                network_protocol: 2001,
                server_name: "localhost:27015".to_owned(),
                client_name: "nekz".to_owned(),
                map_name: "sp_a1_intro1".to_owned(),
                game_directory: "portal2".to_owned(),
                playback_time: 12.5,
                playback_ticks: 750,
                playback_frames: 749,
                signon_length: 0,
            }
        );
        assert!(header.has_slots());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let data = header_bytes(b"ElfFile\x00");
        let err = DemoHeader::from_cursor(&mut ByteCursor::new(&data)).unwrap_err();
        assert!(matches!(err, DemoError::InvalidMagic { .. }));
    }

    #[test]
    fn test_rejects_truncated_header() {
        let data = header_bytes(DEMO_HEADER_MAGIC);
        let err = DemoHeader::from_cursor(&mut ByteCursor::new(&data[..600])).unwrap_err();
        assert!(matches!(err, DemoError::Truncated { .. }));
    }
}
