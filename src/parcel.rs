//! Parcel Decoder
//!
//! Extracts the native window identifier from the opaque descriptor blob
//! returned by the display service when a layer is opened. The blob is a
//! vendor-serialized parcel: two little-endian u32 header fields describe
//! a payload sub-region, and the third u32 word of that payload is the
//! signed window identifier.
//!
//! Pure and bounds-checked: a descriptor whose declared offsets would
//! read past the end of the buffer is rejected, never clamped.

use crate::error::{PresentError, Result};

/// Largest descriptor the display service is allowed to hand us.
/// The remote side serializes into a fixed 0x100-byte window.
pub const MAX_DESCRIPTOR_LEN: usize = 0x100;

/// Minimum payload size: the window identifier is the third u32 word,
/// so a valid payload spans at least 12 bytes.
const MIN_PAYLOAD_LEN: u32 = 12;

fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Decode the native window identifier from a descriptor blob.
///
/// Header layout (little-endian):
/// - offset 0: `u32 payload_size`
/// - offset 4: `u32 payload_offset`
///
/// The identifier is the signed u32 at `payload_offset + 8`.
pub fn decode_window_id(buf: &[u8]) -> Result<i32> {
    if buf.len() > MAX_DESCRIPTOR_LEN {
        return Err(PresentError::MalformedDescriptor("descriptor too large"));
    }
    if buf.len() < 8 {
        return Err(PresentError::MalformedDescriptor(
            "descriptor shorter than header",
        ));
    }

    let payload_size = read_u32_le(buf, 0) as u64;
    let payload_offset = read_u32_le(buf, 4) as u64;
    let len = buf.len() as u64;

    // Validate the declared payload region before touching it. The sum is
    // computed in u64 so oversized fields cannot wrap around.
    if payload_offset >= len || payload_size >= len || payload_offset + payload_size >= len {
        return Err(PresentError::MalformedDescriptor(
            "payload region out of bounds",
        ));
    }
    if payload_size < u64::from(MIN_PAYLOAD_LEN) {
        return Err(PresentError::MalformedDescriptor("payload too small"));
    }

    // Third u32 word of the payload.
    let id_offset = (payload_offset as usize) + 8;
    Ok(read_u32_le(buf, id_offset) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a descriptor with the given header and a payload whose third
    /// word carries `id`.
    fn descriptor(total_len: usize, payload_size: u32, payload_offset: u32, id: i32) -> Vec<u8> {
        let mut buf = vec![0u8; total_len];
        buf[0..4].copy_from_slice(&payload_size.to_le_bytes());
        buf[4..8].copy_from_slice(&payload_offset.to_le_bytes());
        let off = payload_offset as usize + 8;
        if off + 4 <= total_len {
            buf[off..off + 4].copy_from_slice(&id.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_decode_well_formed() {
        let buf = descriptor(32, 12, 8, 0x2a);
        assert_eq!(decode_window_id(&buf).unwrap(), 42);
    }

    #[test]
    fn test_decode_negative_id() {
        let buf = descriptor(32, 12, 8, -7);
        assert_eq!(decode_window_id(&buf).unwrap(), -7);
    }

    #[test]
    fn test_rejects_offset_past_end() {
        let buf = descriptor(32, 12, 32, 0);
        assert!(matches!(
            decode_window_id(&buf),
            Err(PresentError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_rejects_size_past_end() {
        let buf = descriptor(32, 32, 8, 0);
        assert!(matches!(
            decode_window_id(&buf),
            Err(PresentError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_rejects_region_reaching_end() {
        // offset + size == len is still out of bounds
        let buf = descriptor(32, 24, 8, 0);
        assert!(matches!(
            decode_window_id(&buf),
            Err(PresentError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_rejects_undersized_payload() {
        let buf = descriptor(32, 11, 8, 0);
        assert!(matches!(
            decode_window_id(&buf),
            Err(PresentError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_header() {
        assert!(matches!(
            decode_window_id(&[0u8; 7]),
            Err(PresentError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_blob() {
        let buf = descriptor(MAX_DESCRIPTOR_LEN + 1, 12, 8, 1);
        assert!(matches!(
            decode_window_id(&buf),
            Err(PresentError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_overflowing_fields_do_not_wrap() {
        let buf = descriptor(32, u32::MAX, u32::MAX, 0);
        assert!(matches!(
            decode_window_id(&buf),
            Err(PresentError::MalformedDescriptor(_))
        ));
    }
}
