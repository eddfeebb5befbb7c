// SPDX-License-Identifier: GPL-2.0
//! Report descriptor dumps for offline checks
//!
//! Accepts either the raw bytes (`cat /sys/bus/hid/devices/*/report_descriptor`)
//! or a hex text dump. Text dumps may use plain hex pairs, `0x` prefixes,
//! commas, `#` comments, `R: <len> <bytes...>` lines as written by
//! hid-recorder, `hexdump -C` output, and `xxd` output (plain `-p` or the
//! default offset/ASCII layout).

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Load a descriptor dump from disk
pub fn read_dump(path: &Path) -> Result<Vec<u8>> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {path:?}"))?;
    parse_dump(&raw).with_context(|| format!("Failed to parse {path:?}"))
}

/// Decode a descriptor dump. Anything that is not printable ASCII is binary.
pub fn parse_dump(raw: &[u8]) -> Result<Vec<u8>> {
    let is_text = !raw.is_empty()
        && raw
            .iter()
            .all(|&b| b.is_ascii_graphic() || b.is_ascii_whitespace());

    if !is_text {
        return Ok(raw.to_vec());
    }

    // Checked above: every byte is ASCII
    let text = std::str::from_utf8(raw).context("Dump is not valid text")?;
    parse_hex_text(text)
}

fn parse_hex_text(text: &str) -> Result<Vec<u8>> {
    // hexdump -C: every line starts with an offset, the last one holds nothing else
    let hexdump = text.lines().any(is_hexdump_line);

    let mut bytes = Vec::new();
    let mut recorder_len: Option<usize> = None;

    for (lineno, line) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = hex_columns(line, hexdump);
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if hexdump && line == "*" {
            bail!("line {lineno}: hexdump collapsed repeated lines, dump again with -v");
        }

        let mut tokens = line
            .split(is_separator)
            .filter(|t| !t.is_empty())
            .peekable();

        if hexdump {
            tokens.next();
        }

        if let Some(first) = tokens.peek().copied().filter(|t| t.ends_with(':')) {
            tokens.next();
            // Other hid-recorder records (N:, I:, P:, E:) carry no descriptor bytes
            if first != "R:" {
                continue;
            }
            // hid-recorder: "R: 193 05 01 09 02 ..."
            let len = tokens
                .next()
                .with_context(|| format!("line {lineno}: missing R: length"))?;
            let len: usize = len
                .parse()
                .with_context(|| format!("line {lineno}: bad R: length {len:?}"))?;
            recorder_len = Some(len);
        }

        for token in tokens {
            push_hex_token(&mut bytes, token, lineno)?;
        }
    }

    if let Some(len) = recorder_len {
        if len != bytes.len() {
            bail!(
                "R: line announces {len} bytes but {} were listed",
                bytes.len()
            );
        }
    }

    Ok(bytes)
}

/// `00000000  05 01 09 02 ...  |........|`
fn is_hexdump_line(line: &str) -> bool {
    let line = line.trim();
    line.ends_with('|')
        && line
            .split_whitespace()
            .next()
            .is_some_and(is_offset)
}

/// Offset column of hexdump and xxd (8 hex digits, at least 6 for short dumps)
fn is_offset(token: &str) -> bool {
    token.len() >= 6 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Cut the ASCII column of hexdump -C lines, and the offset and ASCII
/// columns of xxd lines. Anything else comes back unchanged.
fn hex_columns(line: &str, hexdump: bool) -> &str {
    if hexdump {
        return line.split('|').next().unwrap_or("");
    }

    // xxd: "00000000: 0501 0902 a101 8501 0901 a100 0509 1901  ................"
    match line.split_once(':') {
        Some((offset, rest)) if is_offset(offset.trim()) => {
            let rest = rest.trim_start();
            rest.split_once("  ").map_or(rest, |(hex, _ascii)| hex)
        }
        _ => line,
    }
}

/// One token of hex: `05`, `0x05`, or a run of pairs like `0501` / `050109`
fn push_hex_token(bytes: &mut Vec<u8>, token: &str, lineno: usize) -> Result<()> {
    let (digits, prefixed) = match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(digits) => (digits, true),
        None => (token, false),
    };

    let valid = !digits.is_empty()
        && digits.len() % 2 == 0
        && (!prefixed || digits.len() == 2)
        && digits.bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        bail!("line {lineno}: expected hex bytes, got {token:?}");
    }

    for i in (0..digits.len()).step_by(2) {
        let byte = u8::from_str_radix(&digits[i..i + 2], 16)
            .with_context(|| format!("line {lineno}: bad hex byte in {token:?}"))?;
        bytes.push(byte);
    }

    Ok(())
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

/// Space-separated hex, the same layout as the captured descriptor comments
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dasig_rdesc::captured;

    #[test]
    fn test_binary_dump_is_passed_through() {
        assert_eq!(parse_dump(&captured::WIRED).unwrap(), captured::WIRED);
    }

    #[test]
    fn test_plain_hex_dump() {
        let text = format_hex(&captured::BLUETOOTH);
        assert_eq!(parse_dump(text.as_bytes()).unwrap(), captured::BLUETOOTH);
    }

    #[test]
    fn test_c_style_hex_dump_with_comments() {
        let text = "# Dasig X prefix\n0x05, 0x01,\n0x09, 0x02, # usage (mouse)\n";
        assert_eq!(
            parse_dump(text.as_bytes()).unwrap(),
            vec![0x05, 0x01, 0x09, 0x02]
        );
    }

    #[test]
    fn test_hid_recorder_dump() {
        let text = format!(
            "# RAKK DASIG X\nR: 89 {}\nN: RAKK DASIG X\nI: 5 248a 8266\n",
            format_hex(&captured::BLUETOOTH)
        );
        assert_eq!(parse_dump(text.as_bytes()).unwrap(), captured::BLUETOOTH);
    }

    #[test]
    fn test_hid_recorder_length_mismatch() {
        let text = "R: 4 05 01 09\n";
        assert!(parse_dump(text.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_garbage_text() {
        assert!(parse_dump(b"hello world").is_err());
        assert!(parse_dump(b"05 010").is_err());
        assert!(parse_dump(b"0x0501").is_err());
    }

    /// `hexdump -C` layout, including the trailing length-only line
    fn hexdump_c(bytes: &[u8]) -> String {
        let mut out = String::new();
        for (i, chunk) in bytes.chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            let (lo, hi) = hex.split_at(hex.len().min(8));
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                .collect();
            out += &format!(
                "{:08x}  {:<23}  {:<23}  |{}|\n",
                i * 16,
                lo.join(" "),
                hi.join(" "),
                ascii
            );
        }
        out += &format!("{:08x}\n", bytes.len());
        out
    }

    /// Default `xxd` layout: offset, 2-byte groups, ASCII column
    fn xxd(bytes: &[u8]) -> String {
        let mut out = String::new();
        for (i, chunk) in bytes.chunks(16).enumerate() {
            let groups: Vec<String> = chunk
                .chunks(2)
                .map(|g| g.iter().map(|b| format!("{b:02x}")).collect())
                .collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                .collect();
            out += &format!("{:08x}: {:<39}  {}\n", i * 16, groups.join(" "), ascii);
        }
        out
    }

    #[test]
    fn test_hexdump_canonical_line() {
        let text = "00000000  05 01 09 02 a1 01 85 01  09 01 a1 00 05 09 19 01  |................|\n00000010\n";
        assert_eq!(parse_dump(text.as_bytes()).unwrap(), captured::WIRED[..16]);
    }

    #[test]
    fn test_hexdump_canonical_dump() {
        for rdesc in [&captured::WIRED[..], &captured::DONGLE[..], &captured::BLUETOOTH[..]] {
            let text = hexdump_c(rdesc);
            assert_eq!(parse_dump(text.as_bytes()).unwrap(), rdesc);
        }
    }

    #[test]
    fn test_hexdump_collapsed_lines_are_rejected() {
        let text = "00000000  00 00 00 00 00 00 00 00  00 00 00 00 00 00 00 00  |................|\n*\n00000020\n";
        let err = parse_dump(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("-v"));
    }

    #[test]
    fn test_xxd_plain_dump() {
        // xxd -p: 30 bytes per line, no separators
        let text: String = captured::BLUETOOTH
            .chunks(30)
            .map(|c| c.iter().map(|b| format!("{b:02x}")).collect::<String>() + "\n")
            .collect();
        assert!(text.starts_with("05010902a101"));
        assert_eq!(parse_dump(text.as_bytes()).unwrap(), captured::BLUETOOTH);
    }

    #[test]
    fn test_xxd_default_dump() {
        let text = xxd(&captured::DONGLE);
        assert!(text.starts_with("00000000: 0501 0902 a101"));
        assert_eq!(parse_dump(text.as_bytes()).unwrap(), captured::DONGLE);
    }

    #[test]
    fn test_empty_dump() {
        assert!(parse_dump(b"").unwrap().is_empty());
        assert!(parse_dump(b"  \n# nothing\n").unwrap().is_empty());
    }
}
