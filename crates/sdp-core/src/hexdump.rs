//! Hex dump formatting for report tracing and CLI output.

/// Format `data` as `offset: hex bytes | ascii` lines of `width` bytes.
///
/// Offsets are zero-padded to a fixed number of hex digits so columns line
/// up; the last line is padded with blanks.
pub fn hex_dump(data: &[u8], width: usize) -> String {
    let width = if width == 0 { 16 } else { width };

    let mut digits = 1;
    let mut rest = data.len() / width;
    while rest > 0 {
        rest /= width;
        digits += 1;
    }

    let mut out = String::new();
    for (line, chunk) in data.chunks(width).enumerate() {
        out.push_str(&format!("{:0digits$X}: ", line * width, digits = digits));
        for i in 0..width {
            match chunk.get(i) {
                Some(b) => out.push_str(&format!("{:02X} ", b)),
                None => out.push_str("   "),
            }
        }
        out.push_str("| ");
        for i in 0..width {
            match chunk.get(i) {
                Some(&b) if (32..=126).contains(&b) => out.push(b as char),
                Some(_) => out.push('.'),
                None => out.push(' '),
            }
        }
        out.push('\n');
    }
    out
}
