//! UTF-16LE to UTF-8 conversion for PMX string fields.
//!
//! PMX stores strings length-prefixed in either UTF-8 or little-endian
//! UTF-16; this module handles the UTF-16 side. Following the format's
//! reference behavior, the unit after a high surrogate is combined without
//! validating that it is a low surrogate, so malformed input degrades to
//! garbage code points rather than an error. Callers materialize the output
//! bytes through `String::from_utf8_lossy`.

const HIGH_SURROGATE_MIN: u16 = 0xD800;
const HIGH_SURROGATE_MAX: u16 = 0xDBFF;

/// Convert a run of UTF-16 code units to UTF-8 bytes.
pub(crate) fn utf16_units_to_utf8(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len() * 3);
    let mut i = 0;
    while i < units.len() {
        let (code, consumed) = decode_code_point(units, i);
        encode_utf8(code, &mut out);
        i += consumed;
    }
    out
}

/// Decode one code point starting at `i`, returning it and the number of
/// units consumed (1 or 2).
fn decode_code_point(units: &[u16], i: usize) -> (u32, usize) {
    let high = units[i];
    if (HIGH_SURROGATE_MIN..=HIGH_SURROGATE_MAX).contains(&high) {
        if let Some(&low) = units.get(i + 1) {
            let code = (u32::from(high) - 0xD800) * 0x400;
            let code = code
                .wrapping_add(u32::from(low).wrapping_sub(0xDC00))
                .wrapping_add(0x10000);
            return (code, 2);
        }
        // An unpaired high surrogate at the end of the run falls through and
        // is emitted as its own value.
    }
    (u32::from(high), 1)
}

/// Append the UTF-8 form of `code`, 1 to 4 bytes selected by value range.
fn encode_utf8(code: u32, out: &mut Vec<u8>) {
    if code <= 0x7F {
        out.push(code as u8);
    } else if code <= 0x7FF {
        out.push(((code >> 6) as u8) | 0xC0);
        out.push(((code & 0x3F) as u8) | 0x80);
    } else if code <= 0xFFFF {
        out.push(((code >> 12) as u8) | 0xE0);
        out.push((((code >> 6) & 0x3F) as u8) | 0x80);
        out.push(((code & 0x3F) as u8) | 0x80);
    } else {
        out.push(((code >> 18) as u8) | 0xF0);
        out.push((((code >> 12) & 0x3F) as u8) | 0x80);
        out.push((((code >> 6) & 0x3F) as u8) | 0x80);
        out.push(((code & 0x3F) as u8) | 0x80);
    }
}
