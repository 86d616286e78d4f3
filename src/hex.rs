use thiserror::Error;

use crate::image::{ImageError, MemoryImage};

/// Data records of an Intel HEX file, merged into contiguous segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMap {
    segments: Vec<Segment>,
    pub byte_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    start: u32,
    data: Vec<u8>,
}

impl Segment {
    fn end(&self) -> u64 {
        self.start as u64 + self.data.len() as u64
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HexError {
    #[error("invalid hex line {line_no}: {msg}")]
    InvalidLine { line_no: usize, msg: String },

    #[error("invalid checksum at line {line_no}")]
    InvalidChecksum { line_no: usize },

    #[error("address overflow at line {line_no}")]
    AddressOverflow { line_no: usize },

    #[error("data at 0x{addr:08X} is written twice (line {line_no})")]
    Overlap { line_no: usize, addr: u32 },
}

pub fn parse_hex(text: &str) -> Result<MemoryMap, HexError> {
    let mut records: Vec<(usize, Segment)> = Vec::new();
    let mut byte_count: usize = 0;
    let mut ext_addr: u32 = 0;

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(digits) = line.strip_prefix(':') else {
            return Err(HexError::InvalidLine {
                line_no,
                msg: "missing ':' prefix".to_string(),
            });
        };

        let bytes =
            decode_hex_bytes(digits).map_err(|msg| HexError::InvalidLine { line_no, msg })?;

        if bytes.len() < 5 {
            return Err(HexError::InvalidLine {
                line_no,
                msg: "record too short".to_string(),
            });
        }

        let len = bytes[0] as usize;
        let addr = u16::from_be_bytes([bytes[1], bytes[2]]) as u32;
        let rec_type = bytes[3];

        if bytes.len() != 5 + len {
            return Err(HexError::InvalidLine {
                line_no,
                msg: format!(
                    "bad length (expected {} bytes after ':', got {})",
                    2 * (5 + len),
                    2 * bytes.len()
                ),
            });
        }

        let payload = &bytes[4..4 + len];
        let checksum = bytes[4 + len];
        if checksum != checksum_ihex(&bytes[0..4 + len]) {
            return Err(HexError::InvalidChecksum { line_no });
        }

        match rec_type {
            0x00 => {
                if len == 0 {
                    continue;
                }
                let start = ext_addr
                    .checked_add(addr)
                    .ok_or(HexError::AddressOverflow { line_no })?;
                start
                    .checked_add(len as u32 - 1)
                    .ok_or(HexError::AddressOverflow { line_no })?;
                byte_count = byte_count.saturating_add(len);
                records.push((
                    line_no,
                    Segment {
                        start,
                        data: payload.to_vec(),
                    },
                ));
            }
            0x01 => break,
            0x02 | 0x04 => {
                if len != 2 {
                    return Err(HexError::InvalidLine {
                        line_no,
                        msg: "extended address record needs 2 data bytes".to_string(),
                    });
                }
                let v = u16::from_be_bytes([payload[0], payload[1]]) as u32;
                ext_addr = if rec_type == 0x02 { v << 4 } else { v << 16 };
            }
            _ => {
                // start address records do not affect the image
            }
        }
    }

    Ok(MemoryMap {
        segments: merge(records)?,
        byte_count,
    })
}

fn merge(mut records: Vec<(usize, Segment)>) -> Result<Vec<Segment>, HexError> {
    records.sort_by_key(|(_, s)| s.start);

    let mut out: Vec<Segment> = Vec::new();
    for (line_no, seg) in records {
        match out.last_mut() {
            Some(prev) if (seg.start as u64) < prev.end() => {
                return Err(HexError::Overlap {
                    line_no,
                    addr: seg.start,
                });
            }
            Some(prev) if seg.start as u64 == prev.end() => {
                prev.data.extend_from_slice(&seg.data);
            }
            _ => out.push(seg),
        }
    }
    Ok(out)
}

impl MemoryMap {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of contiguous runs of data.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Image starting at `base` and running to the last data byte.
    ///
    /// Gaps between segments are filled with 0xFF so they read as erased flash.
    /// Images longer than `capacity` are rejected before anything is allocated.
    pub fn image_at(&self, base: u32, capacity: usize) -> Result<MemoryImage, ImageError> {
        if let Some(below) = self.segments.iter().find(|s| s.start < base) {
            return Err(ImageError::BelowBase {
                addr: below.start,
                base,
            });
        }
        let first = self
            .segments
            .first()
            .ok_or(ImageError::NoDataAtBase { base })?;
        if first.start != base {
            return Err(ImageError::NoDataAtBase { base });
        }

        let end = self.segments.last().map_or(base as u64, Segment::end);
        let len = end - base as u64;
        if len > capacity as u64 {
            return Err(ImageError::TooLarge {
                len: usize::try_from(len).unwrap_or(usize::MAX),
                capacity,
            });
        }
        let mut data = vec![0xFFu8; len as usize];
        for s in &self.segments {
            let off = (s.start - base) as usize;
            data[off..off + s.data.len()].copy_from_slice(&s.data);
        }
        Ok(MemoryImage::new(base, data))
    }
}

fn decode_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let hi = from_hex_digit(bytes[i]).ok_or_else(|| "invalid hex digit".to_string())?;
        let lo = from_hex_digit(bytes[i + 1]).ok_or_else(|| "invalid hex digit".to_string())?;
        out.push((hi << 4) | lo);
        i += 2;
    }
    Ok(out)
}

fn from_hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn checksum_ihex(bytes: &[u8]) -> u8 {
    let sum: u8 = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    (!sum).wrapping_add(1)
}

#[cfg(test)]
pub(crate) fn ihex_record(addr: u16, rec_type: u8, payload: &[u8]) -> String {
    let mut bytes: Vec<u8> = Vec::new();
    bytes.push(payload.len() as u8);
    bytes.extend_from_slice(&addr.to_be_bytes());
    bytes.push(rec_type);
    bytes.extend_from_slice(payload);
    let cksum = checksum_ihex(&bytes);
    bytes.push(cksum);

    let mut s = String::from(":");
    for b in bytes {
        s.push_str(&format!("{b:02X}"));
    }
    s
}
