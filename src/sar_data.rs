//! Decoding of SAR custom-data payloads.
//!
//! Every payload starts with a one byte type tag, followed by a fixed or variable number of
//! fields depending on the tag. Declared lengths always include the tag byte.
//!
//! Decoding a single payload never fails as far as callers are concerned: anything wrong with a
//! record (truncated fields, a length that does not match its type, an unknown tag) turns it into
//! [`SarData::Invalid`], so one bad record cannot hide the rest of the demo.

use crate::err::{DecodeError, DecodeResult};
use crate::utils::{ByteCursor, bytes};

use log::debug;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SarDataType {
    TimescaleCheat,
    InitialCvar,
    EntityInput,
    EntityInputSlot,
    PortalPlacement,
    ChallengeFlags,
    CrouchFly,
    Pause,
    WaitRun,
    SpeedrunTime,
    Timestamp,
    FileChecksum,
    HwaitRun,
    ChecksumV2,
    Checksum,
    Invalid,
}

impl SarDataType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        let data_type = match tag {
            0x01 => SarDataType::TimescaleCheat,
            0x02 => SarDataType::InitialCvar,
            0x03 => SarDataType::EntityInput,
            0x04 => SarDataType::EntityInputSlot,
            0x05 => SarDataType::PortalPlacement,
            0x06 => SarDataType::ChallengeFlags,
            0x07 => SarDataType::CrouchFly,
            0x08 => SarDataType::Pause,
            0x09 => SarDataType::WaitRun,
            0x0A => SarDataType::SpeedrunTime,
            0x0B => SarDataType::Timestamp,
            0x0C => SarDataType::FileChecksum,
            0x0D => SarDataType::HwaitRun,
            0xFE => SarDataType::ChecksumV2,
            0xFF => SarDataType::Checksum,
            _ => return None,
        };

        Some(data_type)
    }

    /// On-disk tag, if the type has one.
    pub fn tag(self) -> Option<u8> {
        let tag = match self {
            SarDataType::TimescaleCheat => 0x01,
            SarDataType::InitialCvar => 0x02,
            SarDataType::EntityInput => 0x03,
            SarDataType::EntityInputSlot => 0x04,
            SarDataType::PortalPlacement => 0x05,
            SarDataType::ChallengeFlags => 0x06,
            SarDataType::CrouchFly => 0x07,
            SarDataType::Pause => 0x08,
            SarDataType::WaitRun => 0x09,
            SarDataType::SpeedrunTime => 0x0A,
            SarDataType::Timestamp => 0x0B,
            SarDataType::FileChecksum => 0x0C,
            SarDataType::HwaitRun => 0x0D,
            SarDataType::ChecksumV2 => 0xFE,
            SarDataType::Checksum => 0xFF,
            SarDataType::Invalid => return None,
        };

        Some(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityInput {
    pub targetname: String,
    pub classname: String,
    pub inputname: String,
    pub parameter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeedrunSegment {
    pub name: String,
    pub ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeedrunSplit {
    pub name: String,
    pub segs: Vec<SpeedrunSegment>,
}

impl SpeedrunSplit {
    pub fn ticks(&self) -> u64 {
        self.segs.iter().map(|seg| u64::from(seg.ticks)).sum()
    }
}

/// Wall-clock time the recording was made, in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub year: u16,
    /// One-based; stored zero-based on disk.
    pub mon: u16,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SarData {
    TimescaleCheat {
        timescale: f32,
    },
    InitialCvar {
        cvar: String,
        val: String,
    },
    EntityInput(EntityInput),
    EntityInputSlot {
        slot: u8,
        input: EntityInput,
    },
    PortalPlacement {
        slot: u8,
        orange: bool,
        x: f32,
        y: f32,
        z: f32,
    },
    ChallengeFlags {
        slot: u8,
    },
    CrouchFly {
        slot: u8,
    },
    Pause {
        pause_ticks: u32,
    },
    WaitRun {
        tick: u32,
        cmd: String,
    },
    SpeedrunTime {
        splits: Vec<SpeedrunSplit>,
    },
    Timestamp(Timestamp),
    FileChecksum {
        sum: u32,
        path: String,
    },
    HwaitRun {
        ticks: u32,
        cmd: String,
    },
    Checksum {
        demo_sum: u32,
        sar_sum: u32,
    },
    ChecksumV2 {
        sar_sum: u32,
        #[serde(serialize_with = "serialize_hex")]
        signature: [u8; 64],
    },
    Invalid,
}

fn serialize_hex<S: Serializer>(bytes: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error> {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    serializer.serialize_str(&hex)
}

impl SarData {
    pub fn data_type(&self) -> SarDataType {
        match self {
            SarData::TimescaleCheat { .. } => SarDataType::TimescaleCheat,
            SarData::InitialCvar { .. } => SarDataType::InitialCvar,
            SarData::EntityInput(_) => SarDataType::EntityInput,
            SarData::EntityInputSlot { .. } => SarDataType::EntityInputSlot,
            SarData::PortalPlacement { .. } => SarDataType::PortalPlacement,
            SarData::ChallengeFlags { .. } => SarDataType::ChallengeFlags,
            SarData::CrouchFly { .. } => SarDataType::CrouchFly,
            SarData::Pause { .. } => SarDataType::Pause,
            SarData::WaitRun { .. } => SarDataType::WaitRun,
            SarData::SpeedrunTime { .. } => SarDataType::SpeedrunTime,
            SarData::Timestamp(_) => SarDataType::Timestamp,
            SarData::FileChecksum { .. } => SarDataType::FileChecksum,
            SarData::HwaitRun { .. } => SarDataType::HwaitRun,
            SarData::Checksum { .. } => SarDataType::Checksum,
            SarData::ChecksumV2 { .. } => SarDataType::ChecksumV2,
            SarData::Invalid => SarDataType::Invalid,
        }
    }

    /// Decode one payload whose length field says `declared_len` bytes.
    ///
    /// `payload` may be longer than `declared_len` (trailing data after the stop message is handed
    /// over as-is); reads never go past the declared length.
    pub fn decode(payload: &[u8], declared_len: usize) -> SarData {
        match Self::try_decode(payload, declared_len) {
            Ok(data) => data,
            Err(e) => {
                debug!("Treating sar data as invalid: {e}");
                SarData::Invalid
            }
        }
    }

    pub fn try_decode(payload: &[u8], declared_len: usize) -> DecodeResult<SarData> {
        if declared_len == 0 {
            return Err(bytes::truncated("sar data type", 0, 1, 0));
        }

        let tag = bytes::read_u8(payload, 0)
            .ok_or_else(|| bytes::truncated("sar data type", 0, 1, payload.len()))?;

        // The legacy checksum record claims 5 bytes but carries 9.
        let len = match (SarDataType::from_u8(tag), declared_len) {
            (Some(SarDataType::Checksum), 5) => 9,
            _ => declared_len,
        };

        let scope = &payload[..len.min(payload.len())];
        let mut cursor = ByteCursor::new(scope);
        cursor.u8_named("sar data type")?;

        decode_fields(tag, len, &mut cursor)
    }
}

fn expect_len(tag: u8, len: usize, ok: bool, expected: &'static str) -> DecodeResult<()> {
    match ok {
        true => Ok(()),
        false => Err(DecodeError::LengthMismatch {
            tag,
            declared: len,
            expected,
        }),
    }
}

/// Shared by `EntityInput` and `EntityInputSlot`; the slot variant reads its slot first.
fn read_entity_input(cursor: &mut ByteCursor<'_>) -> DecodeResult<EntityInput> {
    Ok(EntityInput {
        targetname: cursor.ascii_string("entity input targetname")?,
        classname: cursor.ascii_string("entity input classname")?,
        inputname: cursor.ascii_string("entity input inputname")?,
        parameter: cursor.ascii_string("entity input parameter")?,
    })
}

fn read_speedrun_time(tag: u8, cursor: &mut ByteCursor<'_>) -> DecodeResult<Vec<SpeedrunSplit>> {
    let nsplits = cursor.u32_named("speedrun split count")? as usize;
    let mut splits = Vec::with_capacity(nsplits.min(cursor.remaining()));

    for _ in 0..nsplits {
        let name = cursor.ascii_string("speedrun split name")?;
        let nsegs = cursor.u32_named("speedrun segment count")? as usize;
        let mut segs = Vec::with_capacity(nsegs.min(cursor.remaining()));

        for _ in 0..nsegs {
            segs.push(SpeedrunSegment {
                name: cursor.ascii_string("speedrun segment name")?,
                ticks: cursor.u32_named("speedrun segment ticks")?,
            });
        }

        splits.push(SpeedrunSplit { name, segs });
    }

    if cursor.bits_left() > 0 {
        return Err(DecodeError::Overlong {
            tag,
            bits_left: cursor.bits_left(),
        });
    }

    Ok(splits)
}

/// Decode the fields following the tag byte, which `cursor` has already consumed.
fn decode_fields(tag: u8, len: usize, cursor: &mut ByteCursor<'_>) -> DecodeResult<SarData> {
    let data_type = SarDataType::from_u8(tag).ok_or(DecodeError::UnknownTag { tag })?;

    let data = match data_type {
        SarDataType::TimescaleCheat => {
            expect_len(tag, len, len == 5, "5")?;
            SarData::TimescaleCheat {
                timescale: cursor.f32_named("timescale")?,
            }
        }
        SarDataType::InitialCvar => SarData::InitialCvar {
            cvar: cursor.ascii_string("cvar name")?,
            val: cursor.ascii_string("cvar value")?,
        },
        SarDataType::EntityInput => SarData::EntityInput(read_entity_input(cursor)?),
        SarDataType::EntityInputSlot => {
            let slot = cursor.u8_named("entity input slot")?;
            SarData::EntityInputSlot {
                slot,
                input: read_entity_input(cursor)?,
            }
        }
        SarDataType::Checksum => {
            expect_len(tag, len, len == 9, "9")?;
            SarData::Checksum {
                demo_sum: cursor.u32_named("demo checksum")?,
                sar_sum: cursor.u32_named("sar checksum")?,
            }
        }
        SarDataType::ChecksumV2 => {
            expect_len(tag, len, len == 69, "69")?;
            SarData::ChecksumV2 {
                sar_sum: cursor.u32_named("sar checksum")?,
                signature: cursor.array::<64>("checksum signature")?,
            }
        }
        SarDataType::PortalPlacement => {
            expect_len(tag, len, len == 15, "15")?;
            SarData::PortalPlacement {
                slot: cursor.u8_named("portal slot")?,
                orange: cursor.u8_named("portal color")? != 0,
                x: cursor.f32_named("portal x")?,
                y: cursor.f32_named("portal y")?,
                z: cursor.f32_named("portal z")?,
            }
        }
        SarDataType::ChallengeFlags => {
            expect_len(tag, len, len == 2, "2")?;
            SarData::ChallengeFlags {
                slot: cursor.u8_named("challenge flags slot")?,
            }
        }
        SarDataType::CrouchFly => {
            expect_len(tag, len, len == 2, "2")?;
            SarData::CrouchFly {
                slot: cursor.u8_named("crouch fly slot")?,
            }
        }
        SarDataType::Pause => {
            expect_len(tag, len, len == 5, "5")?;
            SarData::Pause {
                pause_ticks: cursor.u32_named("pause ticks")?,
            }
        }
        SarDataType::WaitRun => {
            expect_len(tag, len, len >= 6, ">= 6")?;
            SarData::WaitRun {
                tick: cursor.u32_named("wait tick")?,
                cmd: cursor.ascii_string("wait command")?,
            }
        }
        SarDataType::HwaitRun => {
            expect_len(tag, len, len >= 6, ">= 6")?;
            SarData::HwaitRun {
                ticks: cursor.u32_named("hwait ticks")?,
                cmd: cursor.ascii_string("hwait command")?,
            }
        }
        SarDataType::SpeedrunTime => {
            expect_len(tag, len, len >= 5, ">= 5")?;
            SarData::SpeedrunTime {
                splits: read_speedrun_time(tag, cursor)?,
            }
        }
        SarDataType::Timestamp => {
            expect_len(tag, len, len == 8, "8")?;
            let year_lo = cursor.u8_named("timestamp year")?;
            let year_hi = cursor.u8_named("timestamp year")?;
            SarData::Timestamp(Timestamp {
                year: u16::from(year_lo) | (u16::from(year_hi) << 8),
                mon: u16::from(cursor.u8_named("timestamp month")?) + 1,
                day: cursor.u8_named("timestamp day")?,
                hour: cursor.u8_named("timestamp hour")?,
                min: cursor.u8_named("timestamp minute")?,
                sec: cursor.u8_named("timestamp second")?,
            })
        }
        SarDataType::FileChecksum => {
            expect_len(tag, len, len >= 6, ">= 6")?;
            SarData::FileChecksum {
                sum: cursor.u32_named("file checksum")?,
                path: cursor.ascii_string("file path")?,
            }
        }
        SarDataType::Invalid => return Err(DecodeError::UnknownTag { tag }),
    };

    Ok(data)
}
