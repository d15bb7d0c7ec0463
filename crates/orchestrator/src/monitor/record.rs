#![forbid(unsafe_code)]

//! Safe decoding of `fanotify_event_metadata` records.
//!
//! A single read from a fanotify descriptor returns zero or more records
//! packed back to back. Each record starts with a fixed header in native
//! byte order:
//!
//! | offset | size | field          |
//! |--------|------|----------------|
//! | 0      | 4    | `event_len`    |
//! | 4      | 1    | `vers`         |
//! | 5      | 1    | reserved       |
//! | 6      | 2    | `metadata_len` |
//! | 8      | 8    | `mask`         |
//! | 16     | 4    | `fd`           |
//! | 20     | 4    | `pid`          |
//!
//! `event_len` covers the header plus any trailing info records (file handles
//! and names when the group reports file identities), so it is used to step
//! to the next record.

use crate::error::DecodeError;

/// `FANOTIFY_METADATA_VERSION` of the kernel ABI.
pub const METADATA_VERSION: u8 = 3;

/// Size of the fixed record header.
pub const METADATA_LEN: usize = 24;

const EVENT_LEN_OFFSET: usize = 0;
const VERS_OFFSET: usize = 4;
const METADATA_LEN_OFFSET: usize = 6;
const MASK_OFFSET: usize = 8;
const FD_OFFSET: usize = 16;
const PID_OFFSET: usize = 20;

/// `FAN_NOFD`: the record carries no open file descriptor.
pub const NO_FD: i32 = -1;

/// The header fields of one kernel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub mask: u64,
    pub fd: i32,
    pub pid: i32,
}

impl RawEvent {
    pub fn new(mask: u64, pid: i32) -> Self {
        Self {
            mask,
            fd: NO_FD,
            pid,
        }
    }

    /// Lay the event out the way the kernel does, without info records.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; METADATA_LEN];
        buf[EVENT_LEN_OFFSET..VERS_OFFSET].copy_from_slice(&(METADATA_LEN as u32).to_ne_bytes());
        buf[VERS_OFFSET] = METADATA_VERSION;
        buf[METADATA_LEN_OFFSET..MASK_OFFSET]
            .copy_from_slice(&(METADATA_LEN as u16).to_ne_bytes());
        buf[MASK_OFFSET..FD_OFFSET].copy_from_slice(&self.mask.to_ne_bytes());
        buf[FD_OFFSET..PID_OFFSET].copy_from_slice(&self.fd.to_ne_bytes());
        buf[PID_OFFSET..METADATA_LEN].copy_from_slice(&self.pid.to_ne_bytes());
        buf
    }
}

/// Iterate over the records in `buf`.
pub fn decode_events(buf: &[u8]) -> EventRecords<'_> {
    EventRecords { buf, done: false }
}

/// Iterator over the records of one read.
///
/// A framing error (truncated header, impossible length) ends the iteration
/// because the position of the next record is unknown. A version mismatch
/// only skips the offending record.
#[derive(Debug)]
pub struct EventRecords<'a> {
    buf: &'a [u8],
    done: bool,
}

impl Iterator for EventRecords<'_> {
    type Item = Result<RawEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.buf.is_empty() {
            return None;
        }

        let remaining = self.buf.len();
        let Some(event_len) = field::<4>(self.buf, EVENT_LEN_OFFSET).map(u32::from_ne_bytes)
        else {
            self.done = true;
            return Some(Err(DecodeError::Truncated { remaining }));
        };
        if remaining < METADATA_LEN {
            self.done = true;
            return Some(Err(DecodeError::Truncated { remaining }));
        }

        let event_len = event_len as usize;
        if event_len < METADATA_LEN || event_len > remaining {
            self.done = true;
            return Some(Err(DecodeError::BadLength {
                event_len,
                remaining,
            }));
        }

        let (record, rest) = self.buf.split_at(event_len);
        self.buf = rest;
        Some(parse_header(record))
    }
}

fn parse_header(record: &[u8]) -> Result<RawEvent, DecodeError> {
    let truncated = DecodeError::Truncated {
        remaining: record.len(),
    };
    let vers = *record.get(VERS_OFFSET).ok_or(truncated.clone())?;
    if vers != METADATA_VERSION {
        return Err(DecodeError::Version {
            found: vers,
            expected: METADATA_VERSION,
        });
    }
    let mask = field::<8>(record, MASK_OFFSET).ok_or(truncated.clone())?;
    let fd = field::<4>(record, FD_OFFSET).ok_or(truncated.clone())?;
    let pid = field::<4>(record, PID_OFFSET).ok_or(truncated)?;
    Ok(RawEvent {
        mask: u64::from_ne_bytes(mask),
        fd: i32::from_ne_bytes(fd),
        pid: i32::from_ne_bytes(pid),
    })
}

fn field<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    buf.get(offset..offset.checked_add(N)?)?.try_into().ok()
}
