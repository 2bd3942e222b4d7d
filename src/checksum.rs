//! Demo checksums appended by SAR after the stop message.
//!
//! Two schemes exist. The legacy scheme is a plain CRC-32 of the file, minus the checksum record
//! itself. The v2 scheme has SAR sign the demo contents with its release key, so a third party
//! cannot forge a matching checksum.

use crate::sar_data::SarData;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use log::{debug, info};
use serde::Serialize;

/// Bytes excluded from the legacy checksum: the stop epilogue plus the checksum record.
pub const LEGACY_CHECKSUM_TRAILER: usize = 31;
/// Bytes excluded from the v2 signed buffer: the stop epilogue plus the v2 checksum record.
pub const V2_CHECKSUM_TRAILER: usize = 91;

/// Default Ed25519 key v2 checksum signatures are verified against.
///
/// Deployments pin the SAR release signing key here, or pass it through
/// [`crate::ParserSettings::public_key`].
pub const SAR_PUBLIC_KEY: [u8; 32] = [
    0x1f, 0x43, 0xc2, 0x9d, 0x6d, 0x0a, 0x8b, 0x52, 0x2c, 0x7e, 0x36, 0x91, 0x4b, 0xa8, 0x10, 0xf5,
    0xe9, 0x02, 0x77, 0x3c, 0xd4, 0x5b, 0x61, 0xaf, 0x88, 0x19, 0xc0, 0x2e, 0x94, 0x6a, 0x3d, 0x07,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum V2SumState {
    /// No v2 checksum record in the demo.
    #[default]
    None,
    Invalid,
    Valid,
}

/// Outcome of running whichever checksum scheme the demo carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChecksumOutcome {
    pub checksum: Option<u32>,
    pub v2sum_state: V2SumState,
}

/// CRC-32 (IEEE) over everything but the legacy checksum trailer.
pub fn legacy_checksum(raw: &[u8]) -> u32 {
    let end = raw.len().saturating_sub(LEGACY_CHECKSUM_TRAILER);
    crc32fast::hash(&raw[..end])
}

/// The message SAR signs: the demo without the v2 trailer, followed by the checksum it reported.
pub fn v2_signed_message(raw: &[u8], sar_sum: u32) -> Vec<u8> {
    let end = raw.len().saturating_sub(V2_CHECKSUM_TRAILER);
    let mut message = Vec::with_capacity(end + 4);
    message.extend_from_slice(&raw[..end]);
    message.extend_from_slice(&sar_sum.to_le_bytes());
    message
}

pub fn verify_v2_signature(
    raw: &[u8],
    sar_sum: u32,
    signature: &[u8; 64],
    public_key: &[u8; 32],
) -> V2SumState {
    let key = match VerifyingKey::from_bytes(public_key) {
        Ok(key) => key,
        Err(e) => {
            debug!("Unusable v2 checksum public key: {e}");
            return V2SumState::Invalid;
        }
    };

    let signature = Signature::from_bytes(signature);
    let message = v2_signed_message(raw, sar_sum);

    match key.verify(&message, &signature) {
        Ok(()) => V2SumState::Valid,
        Err(e) => {
            debug!("v2 checksum signature did not verify: {e}");
            V2SumState::Invalid
        }
    }
}

/// Run the checksum scheme selected by the record SAR appended to the demo, if any.
pub fn check(raw: &[u8], trailing: Option<&SarData>, public_key: &[u8; 32]) -> ChecksumOutcome {
    match trailing {
        Some(SarData::Checksum { .. }) => {
            let checksum = legacy_checksum(raw);
            info!("Legacy demo checksum: {checksum:08X}");
            ChecksumOutcome {
                checksum: Some(checksum),
                v2sum_state: V2SumState::None,
            }
        }
        Some(SarData::ChecksumV2 { sar_sum, signature }) => {
            let v2sum_state = verify_v2_signature(raw, *sar_sum, signature, public_key);
            info!("v2 demo checksum: {sar_sum:08X}, signature {v2sum_state:?}");
            ChecksumOutcome {
                checksum: Some(*sar_sum),
                v2sum_state,
            }
        }
        _ => ChecksumOutcome::default(),
    }
}
