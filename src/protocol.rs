// MIT License - Copyright (c) 2026 Peter Wright
// Satel INTEGRA frame codec

use std::collections::BTreeSet;

use tracing::debug;

use crate::constants::{
    cmd, CODE_LEN, CRC_SEED, FRAME_END, FRAME_SYNC, MONITOR_MASK_LEN, OUTPUT_MASK_LEN, STUFFED,
    ZONE_MASK_LEN,
};
use crate::error::{Result, SatelError};

/// Commands sent to the panel.
///
/// # Framing
///
/// Every command travels as `FE FE <cmd> <data…> <crc_hi> <crc_lo> FE 0D`.
/// A `FE` byte inside the body (command, data or checksum) is followed by
/// `F0` so it can't be mistaken for a frame boundary.
///
/// # Results
///
/// Control commands (arm, disarm, clear, outputs, start monitoring) are
/// answered by a `0xEF` frame carrying a single [`ResultCode`](crate::error::ResultCode)
/// byte. The keep-alive query is answered by a device-name frame that is
/// simply ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `0x7F` + 12-byte bitmask: ask the panel to push the listed notifications.
    StartMonitoring { commands: Vec<u8> },
    /// `0x80`-`0x83` + code + 4-byte zone mask: arm the zones in `mode` (0-3).
    Arm { mode: u8, code: String, zones: Vec<u32> },
    /// `0x84` + code + 4-byte zone mask.
    Disarm { code: String, zones: Vec<u32> },
    /// `0x85` + code + 4-byte zone mask: clear alarm memory.
    ClearAlarm { code: String, zones: Vec<u32> },
    /// `0x88` (on) / `0x89` (off) + code + 16-byte output mask.
    SetOutputs { on: bool, code: String, outputs: Vec<u32> },
    /// `0xEE 01 01`: read the name of zone 1; sent periodically so the
    /// ETHM module doesn't drop an idle connection.
    KeepAlive,
}

impl Command {
    /// The command byte.
    pub fn code(&self) -> u8 {
        match self {
            Command::StartMonitoring { .. } => cmd::START_MONITORING,
            Command::Arm { mode, .. } => cmd::ARM_MODE0 + mode,
            Command::Disarm { .. } => cmd::DISARM,
            Command::ClearAlarm { .. } => cmd::CLEAR_ALARM,
            Command::SetOutputs { on: true, .. } => cmd::OUTPUTS_ON,
            Command::SetOutputs { on: false, .. } => cmd::OUTPUTS_OFF,
            Command::KeepAlive => cmd::READ_DEVICE_NAME,
        }
    }

    /// Whether the panel answers this command with a `0xEF` result frame.
    pub fn expects_result(&self) -> bool {
        !matches!(self, Command::KeepAlive)
    }

    /// Build the data bytes following the command byte.
    pub fn payload(&self) -> Result<Vec<u8>> {
        match self {
            Command::StartMonitoring { commands } => {
                let numbers: Vec<u32> = commands.iter().map(|c| *c as u32 + 1).collect();
                encode_mask(&numbers, MONITOR_MASK_LEN)
            }
            Command::Arm { mode, code, zones } => {
                if *mode > 3 {
                    return Err(SatelError::InvalidArmMode(*mode));
                }
                code_with_mask(code, zones, ZONE_MASK_LEN)
            }
            Command::Disarm { code, zones } | Command::ClearAlarm { code, zones } => {
                code_with_mask(code, zones, ZONE_MASK_LEN)
            }
            Command::SetOutputs { code, outputs, .. } => {
                code_with_mask(code, outputs, OUTPUT_MASK_LEN)
            }
            Command::KeepAlive => Ok(vec![0x01, 0x01]),
        }
    }

    /// Encode the full wire frame.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = self.payload()?;
        Ok(encode_frame(self.code(), &payload))
    }
}

fn code_with_mask(code: &str, numbers: &[u32], mask_len: usize) -> Result<Vec<u8>> {
    let mut data = encode_code(code)?.to_vec();
    data.extend(encode_mask(numbers, mask_len)?);
    Ok(data)
}

/// A decoded frame received from the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub data: Vec<u8>,
}

/// Compute the frame checksum over the command byte and data.
pub fn checksum(body: &[u8]) -> u16 {
    let mut crc = CRC_SEED;
    for &b in body {
        crc = crc.rotate_left(1);
        crc ^= 0xFFFF;
        crc = crc.wrapping_add(crc >> 8).wrapping_add(b as u16);
    }
    crc
}

/// Build a complete frame (header, stuffed body with checksum, footer).
pub fn encode_frame(command: u8, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 3);
    body.push(command);
    body.extend_from_slice(data);
    let crc = checksum(&body);
    body.push((crc >> 8) as u8);
    body.push((crc & 0xFF) as u8);

    let mut frame = Vec::with_capacity(body.len() + 6);
    frame.push(FRAME_SYNC);
    frame.push(FRAME_SYNC);
    for b in body {
        frame.push(b);
        if b == FRAME_SYNC {
            frame.push(STUFFED);
        }
    }
    frame.push(FRAME_SYNC);
    frame.push(FRAME_END);
    frame
}

/// Encode a user code: decimal digits, `F`-padded to 16 nibbles.
///
/// `"1234"` → `12 34 FF FF FF FF FF FF`
pub fn encode_code(code: &str) -> Result<[u8; CODE_LEN]> {
    if code.is_empty() || code.len() > CODE_LEN * 2 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SatelError::InvalidCode);
    }
    let mut out = [0xFFu8; CODE_LEN];
    for (i, digit) in code.bytes().map(|b| b - b'0').enumerate() {
        let byte = &mut out[i / 2];
        if i % 2 == 0 {
            *byte = (digit << 4) | 0x0F;
        } else {
            *byte = (*byte & 0xF0) | digit;
        }
    }
    Ok(out)
}

/// Encode 1-based numbers as a little-endian bitmask of `len` bytes.
///
/// Number `n` sets bit `(n-1) % 8` of byte `(n-1) / 8`.
pub fn encode_mask(numbers: &[u32], len: usize) -> Result<Vec<u8>> {
    let max = (len * 8) as u32;
    let mut mask = vec![0u8; len];
    for &n in numbers {
        if n == 0 || n > max {
            return Err(SatelError::InvalidDeviceId { id: n, max });
        }
        let bit = (n - 1) as usize;
        mask[bit / 8] |= 1 << (bit % 8);
    }
    Ok(mask)
}

/// Decode a bitmask into the set of 1-based numbers whose bit is set.
pub fn decode_mask(mask: &[u8]) -> BTreeSet<u32> {
    mask.iter()
        .enumerate()
        .flat_map(|(byte_idx, &byte)| {
            (0..8)
                .filter(move |bit| byte & (1 << bit) != 0)
                .map(move |bit| (byte_idx * 8 + bit) as u32 + 1)
        })
        .collect()
}

/// Incremental decoder that turns a byte stream into frames.
///
/// Bytes preceding a `FE FE` header are discarded. A frame with a bad
/// checksum yields `Err(ChecksumMismatch)` and decoding carries on with the
/// next frame.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every frame completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<Frame>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();

        loop {
            let Some(start) = self.buf.windows(2).position(|w| w == [FRAME_SYNC, FRAME_SYNC])
            else {
                // Keep a trailing sync byte, it may be the first half of a header
                let keep = usize::from(self.buf.last() == Some(&FRAME_SYNC));
                self.buf.drain(..self.buf.len() - keep);
                break;
            };
            if start > 0 {
                debug!("Discarding {} bytes before frame header", start);
                self.buf.drain(..start);
            }

            match self.scan_body() {
                Scan::Incomplete => break,
                Scan::Complete { body, consumed } => {
                    self.buf.drain(..consumed);
                    out.push(parse_body(body));
                }
                Scan::Resync { skip } => {
                    self.buf.drain(..skip);
                }
            }
        }
        out
    }
}

enum Scan {
    Incomplete,
    Complete { body: Vec<u8>, consumed: usize },
    Resync { skip: usize },
}

impl FrameDecoder {
    /// Scan the body of the frame whose header starts at `buf[0]`.
    fn scan_body(&self) -> Scan {
        let mut body = Vec::new();
        let mut i = 2;
        while i < self.buf.len() {
            let b = self.buf[i];
            if b != FRAME_SYNC {
                body.push(b);
                i += 1;
                continue;
            }
            match self.buf.get(i + 1) {
                None => return Scan::Incomplete,
                Some(&STUFFED) => {
                    body.push(FRAME_SYNC);
                    i += 2;
                }
                Some(&FRAME_END) => {
                    return Scan::Complete { body, consumed: i + 2 };
                }
                Some(&FRAME_SYNC) => {
                    // A new header: the current frame was truncated
                    debug!("Truncated frame, resynchronizing");
                    return Scan::Resync { skip: i };
                }
                Some(_) => {
                    // `FE FE FE xx` is a header preceded by a stray sync byte
                    debug!("Malformed frame, resynchronizing");
                    return Scan::Resync {
                        skip: if i == 2 { 1 } else { i },
                    };
                }
            }
        }
        Scan::Incomplete
    }
}

fn parse_body(body: Vec<u8>) -> Result<Frame> {
    if body.len() < 3 {
        return Err(SatelError::InvalidFrame {
            details: format!("frame too short ({} bytes)", body.len()),
        });
    }
    let (content, crc_bytes) = body.split_at(body.len() - 2);
    let received = u16::from_be_bytes([crc_bytes[0], crc_bytes[1]]);
    let computed = checksum(content);
    if received != computed {
        debug!(
            "Checksum Not Ok (expected {:04X}, got {:04X})",
            computed, received
        );
        return Err(SatelError::ChecksumMismatch);
    }
    Ok(Frame {
        command: content[0],
        data: content[1..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_frame() {
        // Query 0x09 from the INT-RS protocol documentation
        assert_eq!(checksum(&[0x09]), 0xD7EB);
        assert_eq!(
            encode_frame(0x09, &[]),
            vec![0xFE, 0xFE, 0x09, 0xD7, 0xEB, 0xFE, 0x0D]
        );
    }

    #[test]
    fn test_encode_frame_stuffs_sync_bytes() {
        let frame = encode_frame(0x17, &[0xFE, 0x01]);
        assert_eq!(&frame[..5], &[0xFE, 0xFE, 0x17, 0xFE, 0xF0]);
        assert_eq!(&frame[frame.len() - 2..], &[0xFE, 0x0D]);
    }

    #[test]
    fn test_encode_code() {
        assert_eq!(
            encode_code("1234").unwrap(),
            [0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            encode_code("12345").unwrap(),
            [0x12, 0x34, 0x5F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert!(matches!(encode_code(""), Err(SatelError::InvalidCode)));
        assert!(matches!(encode_code("12a4"), Err(SatelError::InvalidCode)));
        assert!(matches!(
            encode_code("12345678901234567"),
            Err(SatelError::InvalidCode)
        ));
    }

    #[test]
    fn test_encode_mask() {
        assert_eq!(encode_mask(&[1], 4).unwrap(), vec![0x01, 0, 0, 0]);
        assert_eq!(encode_mask(&[1, 2, 9], 4).unwrap(), vec![0x03, 0x01, 0, 0]);
        assert_eq!(encode_mask(&[32], 4).unwrap(), vec![0, 0, 0, 0x80]);
        assert!(matches!(
            encode_mask(&[33], 4),
            Err(SatelError::InvalidDeviceId { id: 33, max: 32 })
        ));
        assert!(matches!(
            encode_mask(&[0], 4),
            Err(SatelError::InvalidDeviceId { id: 0, max: 32 })
        ));
    }

    #[test]
    fn test_decode_mask() {
        let set = decode_mask(&[0x05, 0x00, 0x80]);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 3, 24]);
        assert!(decode_mask(&[0, 0, 0, 0]).is_empty());
    }

    #[test]
    fn test_arm_command_payload() {
        let cmd = Command::Arm {
            mode: 1,
            code: "1234".to_string(),
            zones: vec![1, 2],
        };
        assert_eq!(cmd.code(), 0x81);
        let payload = cmd.payload().unwrap();
        assert_eq!(payload.len(), CODE_LEN + ZONE_MASK_LEN);
        assert_eq!(&payload[..2], &[0x12, 0x34]);
        assert_eq!(&payload[CODE_LEN..], &[0x03, 0, 0, 0]);
    }

    #[test]
    fn test_arm_command_invalid_mode() {
        let cmd = Command::Arm {
            mode: 4,
            code: "1234".to_string(),
            zones: vec![1],
        };
        assert!(matches!(cmd.payload(), Err(SatelError::InvalidArmMode(4))));
    }

    #[test]
    fn test_output_command_codes() {
        let on = Command::SetOutputs {
            on: true,
            code: "1111".to_string(),
            outputs: vec![10],
        };
        let off = Command::SetOutputs {
            on: false,
            code: "1111".to_string(),
            outputs: vec![10],
        };
        assert_eq!(on.code(), 0x88);
        assert_eq!(off.code(), 0x89);
        let payload = on.payload().unwrap();
        assert_eq!(payload.len(), CODE_LEN + OUTPUT_MASK_LEN);
        assert_eq!(payload[CODE_LEN + 1], 0x02);
    }

    #[test]
    fn test_start_monitoring_mask() {
        let cmd = Command::StartMonitoring {
            commands: vec![0x00, 0x0A, 0x17, 0x2A],
        };
        let payload = cmd.payload().unwrap();
        assert_eq!(payload.len(), MONITOR_MASK_LEN);
        assert_eq!(payload[0], 0x01);
        assert_eq!(payload[1], 0x04);
        assert_eq!(payload[2], 0x80);
        assert_eq!(payload[5], 0x04);
    }

    #[test]
    fn test_keep_alive_does_not_expect_result() {
        assert!(!Command::KeepAlive.expects_result());
        assert!(Command::Disarm {
            code: "1".to_string(),
            zones: vec![1]
        }
        .expects_result());
        assert_eq!(
            Command::KeepAlive.encode().unwrap()[..5],
            [0xFE, 0xFE, 0xEE, 0x01, 0x01]
        );
    }

    #[test]
    fn test_decoder_single_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(&encode_frame(0x0A, &[0x03, 0, 0, 0]));
        assert_eq!(frames.len(), 1);
        let frame = frames.into_iter().next().unwrap().unwrap();
        assert_eq!(frame.command, 0x0A);
        assert_eq!(frame.data, vec![0x03, 0, 0, 0]);
    }

    #[test]
    fn test_decoder_split_and_stuffed() {
        let mut decoder = FrameDecoder::new();
        let raw = encode_frame(0x17, &[0xFE, 0x00, 0xFE]);
        let (a, b) = raw.split_at(4);
        assert!(decoder.push(a).is_empty());
        let frames = decoder.push(b);
        assert_eq!(frames.len(), 1);
        let frame = frames.into_iter().next().unwrap().unwrap();
        assert_eq!(frame.data, vec![0xFE, 0x00, 0xFE]);
    }

    #[test]
    fn test_decoder_multiple_frames_with_garbage() {
        let mut decoder = FrameDecoder::new();
        let mut raw = vec![0x00, 0x42];
        raw.extend(encode_frame(0xEF, &[0xFF]));
        raw.extend(encode_frame(0x00, &[0x01; 16]));
        let frames: Vec<Frame> = decoder.push(&raw).into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, 0xEF);
        assert_eq!(frames[1].command, 0x00);
        assert_eq!(frames[1].data.len(), 16);
    }

    #[test]
    fn test_decoder_bad_checksum() {
        let mut decoder = FrameDecoder::new();
        let mut raw = encode_frame(0x13, &[0x01, 0, 0, 0]);
        raw[3] ^= 0x01;
        let mut frames = decoder.push(&raw);
        assert!(matches!(frames.pop(), Some(Err(SatelError::ChecksumMismatch))));

        // The decoder recovers on the next good frame
        let frames = decoder.push(&encode_frame(0x13, &[0x01, 0, 0, 0]));
        assert!(frames[0].is_ok());
    }
}
