use crate::err::{DecodeResultExt, DemoError, Result};
use crate::utils::ByteCursor;

use log::trace;

/// Size of one `democmdinfo_t` (flags + view origin/angles for two views).
const CMD_INFO_SIZE: usize = 76;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoMessageType {
    SignOn,
    Packet,
    SyncTick,
    ConsoleCmd,
    UserCmd,
    DataTables,
    Stop,
    CustomData,
    StringTables,
}

impl DemoMessageType {
    /// Message ids shifted when custom data was introduced with demo protocol 4.
    pub fn from_u8(value: u8, demo_protocol: i32) -> Option<Self> {
        let message_type = match (value, demo_protocol >= 4) {
            (1, _) => DemoMessageType::SignOn,
            (2, _) => DemoMessageType::Packet,
            (3, _) => DemoMessageType::SyncTick,
            (4, _) => DemoMessageType::ConsoleCmd,
            (5, _) => DemoMessageType::UserCmd,
            (6, _) => DemoMessageType::DataTables,
            (7, _) => DemoMessageType::Stop,
            (8, true) => DemoMessageType::CustomData,
            (8, false) | (9, true) => DemoMessageType::StringTables,
            _ => return None,
        };

        Some(message_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PacketData<'a> {
    pub in_sequence: i32,
    pub out_sequence: i32,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomData<'a> {
    pub unknown: i32,
    pub data: &'a [u8],
}

impl CustomData<'_> {
    /// SAR only writes its own payloads with a zero callback index; the 64 byte payloads
    /// belong to the game's radial menu.
    pub fn is_sar_data(&self) -> bool {
        self.unknown == 0 && self.data.len() != 64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody<'a> {
    SignOn(PacketData<'a>),
    Packet(PacketData<'a>),
    SyncTick,
    ConsoleCmd(String),
    UserCmd { cmd: i32, data: &'a [u8] },
    DataTables(&'a [u8]),
    /// Everything after the stop message, which may hold data appended after recording ended.
    Stop { trailing: &'a [u8] },
    CustomData(CustomData<'a>),
    StringTables(&'a [u8]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoMessage<'a> {
    pub tick: i32,
    pub slot: Option<u8>,
    pub body: MessageBody<'a>,
}

impl<'a> DemoMessage<'a> {
    pub fn message_type(&self) -> DemoMessageType {
        match self.body {
            MessageBody::SignOn(_) => DemoMessageType::SignOn,
            MessageBody::Packet(_) => DemoMessageType::Packet,
            MessageBody::SyncTick => DemoMessageType::SyncTick,
            MessageBody::ConsoleCmd(_) => DemoMessageType::ConsoleCmd,
            MessageBody::UserCmd { .. } => DemoMessageType::UserCmd,
            MessageBody::DataTables(_) => DemoMessageType::DataTables,
            MessageBody::Stop { .. } => DemoMessageType::Stop,
            MessageBody::CustomData(_) => DemoMessageType::CustomData,
            MessageBody::StringTables(_) => DemoMessageType::StringTables,
        }
    }

    /// The trailing bytes after a stop message, as a fresh cursor.
    pub fn trailing(&self) -> Option<ByteCursor<'a>> {
        match self.body {
            MessageBody::Stop { trailing } => Some(ByteCursor::new(trailing)),
            _ => None,
        }
    }

    pub fn from_cursor(cursor: &mut ByteCursor<'a>, demo_protocol: i32) -> Result<Self> {
        let offset = cursor.position();
        let raw_type = cursor.u8_named("message type").context("message header")?;
        let message_type = DemoMessageType::from_u8(raw_type, demo_protocol).ok_or(
            DemoError::UnknownMessageType {
                message_type: raw_type,
                protocol: demo_protocol,
                offset,
            },
        )?;

        let tick = cursor.i32_named("message tick").context("message header")?;
        let slot = match demo_protocol >= 4 {
            true => Some(cursor.u8_named("message slot").context("message header")?),
            false => None,
        };

        trace!("Offset {offset}: {message_type:?} at tick {tick}");

        let body = match message_type {
            DemoMessageType::SignOn => MessageBody::SignOn(read_packet(cursor, demo_protocol)?),
            DemoMessageType::Packet => MessageBody::Packet(read_packet(cursor, demo_protocol)?),
            DemoMessageType::SyncTick => MessageBody::SyncTick,
            DemoMessageType::ConsoleCmd => {
                let data = read_sized(cursor, "console command")?;
                let command = match data.is_empty() {
                    true => String::new(),
                    false => ByteCursor::new(data)
                        .ascii_string("console command")
                        .context("console command")?,
                };
                MessageBody::ConsoleCmd(command)
            }
            DemoMessageType::UserCmd => {
                let cmd = cursor.i32_named("user command number").context("user command")?;
                MessageBody::UserCmd {
                    cmd,
                    data: read_sized(cursor, "user command")?,
                }
            }
            DemoMessageType::DataTables => MessageBody::DataTables(read_sized(cursor, "data tables")?),
            DemoMessageType::Stop => MessageBody::Stop {
                trailing: cursor.rest(),
            },
            DemoMessageType::CustomData => {
                let unknown = cursor.i32_named("custom data unknown").context("custom data")?;
                MessageBody::CustomData(CustomData {
                    unknown,
                    data: read_sized(cursor, "custom data")?,
                })
            }
            DemoMessageType::StringTables => {
                MessageBody::StringTables(read_sized(cursor, "string tables")?)
            }
        };

        Ok(DemoMessage { tick, slot, body })
    }
}

fn read_packet<'a>(cursor: &mut ByteCursor<'a>, demo_protocol: i32) -> Result<PacketData<'a>> {
    let slots = if demo_protocol >= 4 { 2 } else { 1 };
    cursor
        .advance(CMD_INFO_SIZE * slots, "packet command info")
        .context("packet")?;
    let in_sequence = cursor.i32_named("packet in sequence").context("packet")?;
    let out_sequence = cursor.i32_named("packet out sequence").context("packet")?;

    Ok(PacketData {
        in_sequence,
        out_sequence,
        data: read_sized(cursor, "packet")?,
    })
}

/// Read an `i32` length prefix, then that many bytes.
fn read_sized<'a>(cursor: &mut ByteCursor<'a>, what: &'static str) -> Result<&'a [u8]> {
    let offset = cursor.position();
    let size = cursor.i32_named(what).context(what)?;
    let size = usize::try_from(size).map_err(|_| DemoError::NegativeSize { what, size, offset })?;
    cursor.take_bytes(size, what).context(what)
}
