//! Renders ABI-encoded buffers as comma-separated decimal values.

use crate::error::FormatError;
use crate::types::{AbiKind, Parameter, WORD_SIZE};
use ethers::types::U256;

/// Format `bytes` according to `params`, consuming one slice per parameter.
///
/// An empty buffer renders as the empty string whatever the parameters say.
/// Signed and unsigned parameters share the same decoding: a slice whose
/// leading bit is set is shown as a negative two's complement value, so a
/// result that looks negative is never printed as a huge unsigned number.
/// Every parameter must cover at least one byte.
pub fn format_bytes(bytes: &[u8], params: &[Parameter]) -> Result<String, FormatError> {
    let mut rendered = String::new();
    if bytes.is_empty() {
        return Ok(rendered);
    }

    let mut offset = 0;
    for (index, param) in params.iter().enumerate() {
        let size = param.abi_type.size;
        let end = offset + size;
        if end > bytes.len() {
            return Err(FormatError::InvalidByteRange {
                index,
                offset,
                size,
                available: bytes.len(),
            });
        }
        if size > WORD_SIZE {
            return Err(FormatError::WidthTooLarge { index, size });
        }
        if size == 0 {
            return Err(FormatError::ZeroWidth { index });
        }

        let range = &bytes[offset..end];
        match param.abi_type.kind {
            AbiKind::SignedInteger | AbiKind::UnsignedInteger => {
                rendered.push_str(&decode_sign_detected(range));
            }
            // Forced unsigned so that output without a declared type still prints.
            AbiKind::Invalid | AbiKind::Untyped => {
                rendered.push_str(&U256::from_big_endian(range).to_string());
            }
        }
        offset = end;

        let has_next = index + 1 < params.len();
        if has_next && offset < bytes.len() && param.abi_type.kind != AbiKind::Untyped {
            rendered.push_str(", ");
        }
    }

    Ok(rendered)
}

fn decode_sign_detected(range: &[u8]) -> String {
    let value = U256::from_big_endian(range);
    match range.first() {
        Some(byte) if byte & 0x80 != 0 => {
            let mask = if range.len() == WORD_SIZE {
                U256::MAX
            } else {
                (U256::one() << (8 * range.len())) - U256::one()
            };
            let magnitude = (!value & mask) + U256::one();
            format!("-{}", magnitude)
        }
        _ => value.to_string(),
    }
}
