use crate::checksum::{self, SAR_PUBLIC_KEY, V2SumState};
use crate::demo_header::DemoHeader;
use crate::demo_message::{CustomData, DemoMessage, MessageBody};
use crate::err::{DecodeResult, DemoError, Result};
use crate::sar_data::SarData;
use crate::utils::ByteCursor;

use log::{debug, info};

/// Uploads above this size are rejected before parsing.
pub const DEFAULT_MAX_SIZE: usize = 6 * 1024 * 1024;

/// Trailing data after the stop message only holds an appended record past this many bytes.
const TRAILING_RECORD_MIN_BYTES: usize = 14;
/// Type (1), tick (4), slot (1) and reserved (4) bytes in front of the appended record's size.
const TRAILING_RECORD_HEADER_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserSettings {
    /// `None` disables the size limit.
    max_size: Option<usize>,
    /// Decode the record SAR appends after the stop message (and run its checksum scheme).
    decode_trailing: bool,
    /// Key used to verify v2 checksum signatures.
    public_key: [u8; 32],
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            max_size: Some(DEFAULT_MAX_SIZE),
            decode_trailing: true,
            public_key: SAR_PUBLIC_KEY,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    pub fn max_size(mut self, max_size: Option<usize>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn decode_trailing(mut self, decode_trailing: bool) -> Self {
        self.decode_trailing = decode_trailing;
        self
    }

    pub fn public_key(mut self, public_key: [u8; 32]) -> Self {
        self.public_key = public_key;
        self
    }

    pub fn get_max_size(&self) -> Option<usize> {
        self.max_size
    }

    pub fn should_decode_trailing(&self) -> bool {
        self.decode_trailing
    }

    pub fn get_public_key(&self) -> &[u8; 32] {
        &self.public_key
    }
}

/// The demo container: header plus every message up to and including the stop message.
#[derive(Debug, Clone, PartialEq)]
pub struct Demo<'a> {
    pub header: DemoHeader,
    pub messages: Vec<DemoMessage<'a>>,
}

impl<'a> Demo<'a> {
    pub fn from_buffer(raw: &'a [u8]) -> Result<Demo<'a>> {
        let mut cursor = ByteCursor::new(raw);
        let header = DemoHeader::from_cursor(&mut cursor)?;
        debug!("Demo header: {header:#?}");

        let mut messages = Vec::new();
        loop {
            if cursor.remaining() == 0 {
                return Err(DemoError::MissingStopMessage);
            }

            let message = DemoMessage::from_cursor(&mut cursor, header.demo_protocol)?;
            let is_stop = matches!(message.body, MessageBody::Stop { .. });
            messages.push(message);

            if is_stop {
                break;
            }
        }

        Ok(Demo { header, messages })
    }

    pub fn console_commands(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().filter_map(|m| match &m.body {
            MessageBody::ConsoleCmd(command) => Some(command.as_str()),
            _ => None,
        })
    }

    pub fn custom_data(&self) -> impl Iterator<Item = &CustomData<'a>> {
        self.messages.iter().filter_map(|m| match &m.body {
            MessageBody::CustomData(custom) => Some(custom),
            _ => None,
        })
    }

    pub fn stop(&self) -> Option<&DemoMessage<'a>> {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m.body, MessageBody::Stop { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult<'a> {
    pub demo: Demo<'a>,
    /// Decoded SAR data, in demo order, with the record appended after the stop message last.
    pub messages: Vec<SarData>,
    pub checksum: Option<u32>,
    pub v2sum_state: V2SumState,
}

#[derive(Debug, Clone, Default)]
pub struct DemoParser {
    config: ParserSettings,
}

impl DemoParser {
    pub fn new() -> Self {
        DemoParser::default()
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.config
    }

    pub fn parse<'a>(&self, raw: &'a [u8]) -> Result<ParseResult<'a>> {
        if let Some(limit) = self.config.max_size {
            if raw.len() > limit {
                return Err(DemoError::TooLarge {
                    size: raw.len(),
                    limit,
                });
            }
        }

        let demo = Demo::from_buffer(raw)?;
        info!(
            "Parsed demo of `{}` by `{}` ({} messages)",
            demo.header.map_name,
            demo.header.client_name,
            demo.messages.len()
        );

        let mut messages = Vec::new();
        for custom in demo.custom_data() {
            if !custom.is_sar_data() {
                debug!(
                    "Skipping custom data (unknown = {}, {} bytes)",
                    custom.unknown,
                    custom.data.len()
                );
                continue;
            }
            messages.push(SarData::decode(custom.data, custom.data.len()));
        }

        let trailing = match (self.config.decode_trailing, demo.stop()) {
            (true, Some(stop)) => stop.trailing().and_then(decode_trailing),
            _ => None,
        };

        let outcome = checksum::check(raw, trailing.as_ref(), &self.config.public_key);
        messages.extend(trailing);

        Ok(ParseResult {
            demo,
            messages,
            checksum: outcome.checksum,
            v2sum_state: outcome.v2sum_state,
        })
    }
}

/// Parse `raw` with default settings.
pub fn parse(raw: &[u8]) -> Result<ParseResult<'_>> {
    DemoParser::new().parse(raw)
}

/// Decode the record appended after the stop message, if there is one.
fn decode_trailing(trailing: ByteCursor<'_>) -> Option<SarData> {
    if trailing.bits_left() / 8 <= TRAILING_RECORD_MIN_BYTES {
        return None;
    }

    let mut cursor = trailing;
    match read_trailing_record(&mut cursor) {
        Ok((payload, declared_len)) => Some(SarData::decode(payload, declared_len)),
        Err(e) => {
            debug!("Appended record is unreadable: {e}");
            Some(SarData::Invalid)
        }
    }
}

fn read_trailing_record<'a>(cursor: &mut ByteCursor<'a>) -> DecodeResult<(&'a [u8], usize)> {
    cursor.advance(TRAILING_RECORD_HEADER_SIZE, "appended record header")?;
    let declared_len = cursor.u32_named("appended record size")? as usize;
    Ok((cursor.rest(), declared_len))
}
