//! Byte-encoding detection for redirected input files.

/// Decode `bytes` as text.
///
/// A byte-order mark wins. Without one, strict UTF-8 is tried first, then
/// UTF-16 LE/BE, UTF-32 LE/BE and finally plain ASCII. Returns `None` when
/// nothing decodes cleanly.
pub fn decode(bytes: &[u8]) -> Option<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).ok();
    }
    // UTF-32 LE shares its first two BOM bytes with UTF-16 LE
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE, 0x00, 0x00]) {
        return utf32(rest, u32::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0x00, 0x00, 0xFE, 0xFF]) {
        return utf32(rest, u32::from_be_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return utf16(rest, u16::from_be_bytes);
    }

    std::str::from_utf8(bytes)
        .ok()
        .map(str::to_string)
        .or_else(|| utf16(bytes, u16::from_le_bytes))
        .or_else(|| utf16(bytes, u16::from_be_bytes))
        .or_else(|| utf32(bytes, u32::from_le_bytes))
        .or_else(|| utf32(bytes, u32::from_be_bytes))
        .or_else(|| ascii(bytes))
}

fn utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .ok()
        .filter(|s| !has_stray_controls(s))
}

fn utf32(bytes: &[u8], unit: fn([u8; 4]) -> u32) -> Option<String> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    bytes
        .chunks_exact(4)
        .map(|c| char::from_u32(unit([c[0], c[1], c[2], c[3]])))
        .collect::<Option<String>>()
        .filter(|s| !has_stray_controls(s))
}

fn ascii(bytes: &[u8]) -> Option<String> {
    bytes
        .is_ascii()
        .then(|| bytes.iter().map(|&b| b as char).collect())
}

/// Guessing a wide encoding without a BOM is only trusted when the result
/// has no control characters besides ordinary whitespace.
fn has_stray_controls(s: &str) -> bool {
    s.chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn utf16be(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    #[test]
    fn plain_utf8() {
        assert_eq!(decode("héllo\n".as_bytes()).as_deref(), Some("héllo\n"));
    }

    #[test]
    fn utf8_bom_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"abc");
        assert_eq!(decode(&bytes).as_deref(), Some("abc"));
    }

    #[test]
    fn utf16_with_bom() {
        let mut le = vec![0xFF, 0xFE];
        le.extend(utf16le("wide"));
        assert_eq!(decode(&le).as_deref(), Some("wide"));

        let mut be = vec![0xFE, 0xFF];
        be.extend(utf16be("wide"));
        assert_eq!(decode(&be).as_deref(), Some("wide"));
    }

    #[test]
    fn utf32_with_bom() {
        let mut bytes = vec![0xFF, 0xFE, 0x00, 0x00];
        bytes.extend("ok".chars().flat_map(|c| (c as u32).to_le_bytes()));
        assert_eq!(decode(&bytes).as_deref(), Some("ok"));
    }

    #[test]
    fn utf16_without_bom() {
        assert_eq!(decode(&utf16le("€uro")).as_deref(), Some("€uro"));
    }

    #[test]
    fn garbage_rejected() {
        assert_eq!(decode(&[0xC3, 0x28, 0xA0]), None);
    }
}
