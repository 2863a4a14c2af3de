use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use crate::hex::HEX_PAIR_LOOKUP;
use crate::tag_store::AccessKind;

/// Length of one record in the fixed-width trace format, including the newline
pub const RECORD_SIZE: usize = 40;
const ADDRESS_OFFSET: usize = 17;
const ADDRESS_SIZE: usize = 16;
const ADDRESS_UPPER: usize = ADDRESS_OFFSET + ADDRESS_SIZE;
const RW_MODE: usize = ADDRESS_UPPER + 1;
const SIZE: usize = RW_MODE + 2;

lazy_static! {
    static ref TEXT_RECORD: Regex = Regex::new(concat!(
        r"^\s*(?P<mode>[RrWw])",
        r"\s+(?:0[xX])?(?P<address>[0-9a-fA-F]{1,16})",
        r"(?:\s+(?P<size>[0-9]{1,5}))?\s*$",
    ))
    .expect("the text trace pattern is valid");
}

/// One memory access from a trace
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub address: u64,
    pub size: u16,
    pub kind: AccessKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("line {line}: malformed trace record `{text}`")]
    Malformed { line: usize, text: String },
    #[error("fixed-width trace length {0} is not a multiple of 40")]
    PartialRecord(usize),
}

/// Parses one 40 byte record of the fixed-width format
///
/// The format is a 16 digit hex program counter, a 16 digit hex address, `R` or `W` and a 3 digit
/// decimal size, space separated. The record isn't validated, a malformed record won't panic but
/// will produce a meaningless access
///
/// # Examples
///
/// ```
/// use tagstore::tag_store::AccessKind;
/// use tagstore::trace::parse_fixed_record;
/// let record = b"0000000000400500 00007FFC0000A010 W 008\n";
/// let parsed = parse_fixed_record(record);
/// assert_eq!(parsed.address, 0x7FFC0000A010);
/// assert_eq!(parsed.size, 8);
/// assert_eq!(parsed.kind, AccessKind::Write);
/// ```
pub fn parse_fixed_record(record: &[u8; RECORD_SIZE]) -> TraceRecord {
    let mut address = [0u8; ADDRESS_SIZE];
    address.copy_from_slice(&record[ADDRESS_OFFSET..ADDRESS_UPPER]);
    let mut size = [0u8; 3];
    size.copy_from_slice(&record[SIZE..RECORD_SIZE - 1]);
    TraceRecord {
        address: parse_address(&address),
        size: parse_size(&size),
        kind: if record[RW_MODE] == b'W' { AccessKind::Write } else { AccessKind::Read },
    }
}

/// Parses a 64-bit value from a 16 byte hexadecimal address
///
/// Parsing with the standard library dominates the run time for narrow caches, so each pair of
/// hex digits is looked up in a table of 2^16 entries generated by the build script. Only the 256
/// entries for valid digit pairs are ever touched on well-formed input
///
/// # Examples
///
/// ```
/// use tagstore::trace::parse_address;
/// let address = b"000000000000000A";
/// assert_eq!(parse_address(&address), 10)
/// ```
pub fn parse_address(buf: &[u8; 16]) -> u64 {
    let mut res: u64 = 0;
    for pair in buf.chunks_exact(2) {
        res <<= 8;
        res |= HEX_PAIR_LOOKUP[pair[0] as usize][pair[1] as usize] as u64;
    }
    if cfg!(debug_assertions) {
        let expected = std::str::from_utf8(buf)
            .ok()
            .and_then(|s| u64::from_str_radix(s, 16).ok());
        if let Some(expected) = expected {
            debug_assert_eq!(expected, res);
        }
    }
    res
}

/// Parses the 3 digit decimal size field
///
/// # Examples
///
/// ```
/// use tagstore::trace::parse_size;
/// let size = b"010";
/// assert_eq!(parse_size(&size), 10);
/// ```
pub fn parse_size(buf: &[u8; 3]) -> u16 {
    let mut res = (buf[2].wrapping_sub(b'0')) as u16;
    res += 10u16 * (buf[1].wrapping_sub(b'0')) as u16;
    res += 100u16 * (buf[0].wrapping_sub(b'0')) as u16;
    res
}

/// Parses one line of the text format, `R|W <hex address> [size]`
///
/// Blank lines and `#` comments produce `None`. A missing size means a single byte access
pub fn parse_text_line(line_number: usize, line: &str) -> Result<Option<TraceRecord>, TraceError> {
    let content = line.split('#').next().unwrap_or("");
    if content.trim().is_empty() {
        return Ok(None);
    }
    let malformed = || TraceError::Malformed {
        line: line_number,
        text: line.to_string(),
    };
    let captures = TEXT_RECORD.captures(content).ok_or_else(malformed)?;
    let address = u64::from_str_radix(&captures["address"], 16).map_err(|_| malformed())?;
    let size = match captures.name("size") {
        Some(size) => size.as_str().parse::<u16>().map_err(|_| malformed())?,
        None => 1,
    };
    let kind = match &captures["mode"] {
        "W" | "w" => AccessKind::Write,
        _ => AccessKind::Read,
    };
    Ok(Some(TraceRecord { address, size, kind }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lines_with_and_without_sizes() {
        assert_eq!(
            parse_text_line(1, "R 0x1f40 4"),
            Ok(Some(TraceRecord { address: 0x1f40, size: 4, kind: AccessKind::Read }))
        );
        assert_eq!(
            parse_text_line(2, "  w DEADBEEF  # store"),
            Ok(Some(TraceRecord { address: 0xdead_beef, size: 1, kind: AccessKind::Write }))
        );
        assert_eq!(parse_text_line(3, "   # only a comment"), Ok(None));
        assert_eq!(parse_text_line(4, ""), Ok(None));
    }

    #[test]
    fn malformed_text_lines_are_rejected() {
        for line in ["X 0x10", "R", "R 0xZZ", "R 0x10 abc", "R 0x10 99999"] {
            assert!(
                matches!(parse_text_line(7, line), Err(TraceError::Malformed { line: 7, .. })),
                "accepted `{line}`"
            );
        }
    }

    #[test]
    fn fixed_record_reads_mode_and_size() {
        let record = b"0000000000000000 0000000000001000 R 064\n";
        assert_eq!(
            parse_fixed_record(record),
            TraceRecord { address: 0x1000, size: 64, kind: AccessKind::Read }
        );
    }
}
