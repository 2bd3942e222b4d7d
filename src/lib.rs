#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! Decoding and verification of Source engine demos recorded with SAR.
//!
//! ```no_run
//! use sardemo::{DemoParser, ReportLine, Whitelist, validate};
//!
//! let raw = std::fs::read("run.dem").unwrap();
//! let result = DemoParser::new().parse(&raw).unwrap();
//!
//! let mut report: Vec<ReportLine> = Vec::new();
//! validate(&result, &Whitelist::new(), &mut report);
//! for line in report {
//!     println!("{line}");
//! }
//! ```

pub mod checksum;
pub mod demo_header;
pub mod demo_message;
pub mod demo_parser;
pub mod err;
pub mod report_output;
pub mod sar_data;
pub mod utils;
pub mod validator;
pub mod whitelist;

pub use checksum::{SAR_PUBLIC_KEY, V2SumState};
pub use demo_header::DemoHeader;
pub use demo_message::{DemoMessage, DemoMessageType, MessageBody};
pub use demo_parser::{Demo, DemoParser, ParseResult, ParserSettings, parse};
pub use err::{DecodeError, DemoError};
pub use report_output::{ReportLine, ReportOutput, TextOutput};
pub use sar_data::{SarData, SarDataType};
pub use validator::{Validator, validate};
pub use whitelist::Whitelist;

#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;
    use std::sync::Once;

    static LOGGER_INIT: Once = Once::new();

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
