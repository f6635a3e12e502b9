//! MAVLink framing for the log-transfer messages.
//!
//! Encodes MAVLink v2 frames (unsigned, trailing-zero payload truncation)
//! and decodes both v2 and v1 frames. Only the five log-transfer messages
//! are understood. Frames carrying any other message id cannot be
//! checksummed, so their claimed length is not trusted: like frames failing
//! their checksum, they are dropped one byte at a time until the decoder
//! resynchronises on the next start byte.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{CRC_16_MCRF4XX, Crc};

use crate::error::LinkError;
use crate::message::{
    InboundMessage, LOG_DATA_CAPACITY, LogDataRaw, LogEntryRaw, Message, OutboundMessage, Target,
};

const STX_V2: u8 = 0xFD;
const STX_V1: u8 = 0xFE;
const V2_HEADER_LEN: usize = 10;
const V1_HEADER_LEN: usize = 6;
const CHECKSUM_LEN: usize = 2;
const SIGNATURE_LEN: usize = 13;
const INCOMPAT_SIGNED: u8 = 0x01;

pub const MSG_ID_LOG_REQUEST_LIST: u32 = 117;
pub const MSG_ID_LOG_ENTRY: u32 = 118;
pub const MSG_ID_LOG_REQUEST_DATA: u32 = 119;
pub const MSG_ID_LOG_DATA: u32 = 120;
pub const MSG_ID_LOG_REQUEST_END: u32 = 122;

/// Largest encoded frame this codec produces (an unsigned v2 LOG_DATA).
pub const MAX_FRAME_LEN: usize = V2_HEADER_LEN + LOG_DATA_PAYLOAD_LEN + CHECKSUM_LEN;

const LOG_DATA_PAYLOAD_LEN: usize = 4 + 2 + 1 + LOG_DATA_CAPACITY;

/// Per-message id, CRC_EXTRA seed and full (untruncated) payload length.
#[derive(Debug, Clone, Copy)]
struct MessageLayout {
    id: u32,
    crc_extra: u8,
    payload_len: usize,
}

const fn layout_for(id: u32) -> Option<MessageLayout> {
    let (crc_extra, payload_len) = match id {
        MSG_ID_LOG_REQUEST_LIST => (128, 6),
        MSG_ID_LOG_ENTRY => (56, 14),
        MSG_ID_LOG_REQUEST_DATA => (116, 12),
        MSG_ID_LOG_DATA => (134, LOG_DATA_PAYLOAD_LEN),
        MSG_ID_LOG_REQUEST_END => (203, 2),
        _ => return None,
    };
    Some(MessageLayout {
        id,
        crc_extra,
        payload_len,
    })
}

fn layout_of(message: &Message) -> MessageLayout {
    let id = match message {
        Message::Outbound(OutboundMessage::RequestList { .. }) => MSG_ID_LOG_REQUEST_LIST,
        Message::Outbound(OutboundMessage::RequestData { .. }) => MSG_ID_LOG_REQUEST_DATA,
        Message::Outbound(OutboundMessage::RequestEnd { .. }) => MSG_ID_LOG_REQUEST_END,
        Message::Inbound(InboundMessage::LogEntry(_)) => MSG_ID_LOG_ENTRY,
        Message::Inbound(InboundMessage::LogData(_)) => MSG_ID_LOG_DATA,
    };
    // Every id above has a table entry.
    layout_for(id).unwrap_or(MessageLayout {
        id,
        crc_extra: 0,
        payload_len: 0,
    })
}

// ── Checksum ─────────────────────────────────────────────────────────

/// CRC-16/MCRF4XX, the "X.25" checksum MAVLink uses.
const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

pub fn crc_x25(data: &[u8]) -> u16 {
    X25.checksum(data)
}

fn frame_checksum(covered: &[u8], crc_extra: u8) -> u16 {
    let mut digest = X25.digest();
    digest.update(covered);
    digest.update(&[crc_extra]);
    digest.finalize()
}

// ── Frame ────────────────────────────────────────────────────────────

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u8,
    pub sender: Target,
    pub message: Message,
}

/// Encode `message` as an unsigned MAVLink v2 frame.
pub fn encode(sequence: u8, sender: Target, message: &Message) -> Result<Bytes, LinkError> {
    let layout = layout_of(message);

    let mut payload = BytesMut::with_capacity(layout.payload_len);
    write_payload(message, &mut payload)?;

    // v2 drops trailing zero bytes but always keeps at least one.
    let len = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(1, |last| last + 1);
    payload.truncate(len);
    let len_byte = u8::try_from(len).map_err(|_| LinkError::FrameTooLarge {
        message: message.name(),
        reason: format!("payload of {len} bytes"),
    })?;

    let mut frame = BytesMut::with_capacity(V2_HEADER_LEN + len + CHECKSUM_LEN);
    frame.put_u8(STX_V2);
    frame.put_u8(len_byte);
    frame.put_u8(0); // incompat flags
    frame.put_u8(0); // compat flags
    frame.put_u8(sequence);
    frame.put_u8(sender.system_id);
    frame.put_u8(sender.component_id);
    let [id0, id1, id2, _] = layout.id.to_le_bytes();
    frame.put_slice(&[id0, id1, id2]);
    frame.put_slice(&payload);

    let crc = frame_checksum(frame.get(1..).unwrap_or_default(), layout.crc_extra);
    frame.put_u16_le(crc);

    Ok(frame.freeze())
}

fn write_payload(message: &Message, buf: &mut BytesMut) -> Result<(), LinkError> {
    match message {
        Message::Outbound(OutboundMessage::RequestList { target, start, end }) => {
            buf.put_u16_le(*start);
            buf.put_u16_le(*end);
            buf.put_u8(target.system_id);
            buf.put_u8(target.component_id);
        }
        Message::Outbound(OutboundMessage::RequestData {
            target,
            id,
            ofs,
            count,
        }) => {
            buf.put_u32_le(*ofs);
            buf.put_u32_le(*count);
            buf.put_u16_le(*id);
            buf.put_u8(target.system_id);
            buf.put_u8(target.component_id);
        }
        Message::Outbound(OutboundMessage::RequestEnd { target }) => {
            buf.put_u8(target.system_id);
            buf.put_u8(target.component_id);
        }
        Message::Inbound(InboundMessage::LogEntry(entry)) => {
            buf.put_u32_le(entry.time_utc);
            buf.put_u32_le(entry.size);
            buf.put_u16_le(entry.id);
            buf.put_u16_le(entry.num_logs);
            buf.put_u16_le(entry.last_log_num);
        }
        Message::Inbound(InboundMessage::LogData(data)) => {
            let count = u8::try_from(data.count)
                .ok()
                .filter(|c| usize::from(*c) <= LOG_DATA_CAPACITY)
                .ok_or_else(|| LinkError::FrameTooLarge {
                    message: "LOG_DATA",
                    reason: format!("count {} exceeds {LOG_DATA_CAPACITY}", data.count),
                })?;
            if data.data.len() > LOG_DATA_CAPACITY {
                return Err(LinkError::FrameTooLarge {
                    message: "LOG_DATA",
                    reason: format!(
                        "{} data bytes exceed {LOG_DATA_CAPACITY}",
                        data.data.len()
                    ),
                });
            }
            buf.put_u32_le(data.ofs);
            buf.put_u16_le(data.id);
            buf.put_u8(count);
            buf.put_slice(&data.data);
            buf.put_bytes(0, LOG_DATA_CAPACITY - data.data.len());
        }
    }
    Ok(())
}

fn read_payload(id: u32, mut p: &[u8]) -> Option<Message> {
    let message = match id {
        MSG_ID_LOG_REQUEST_LIST => {
            let start = p.get_u16_le();
            let end = p.get_u16_le();
            let target = Target::new(p.get_u8(), p.get_u8());
            Message::Outbound(OutboundMessage::RequestList { target, start, end })
        }
        MSG_ID_LOG_ENTRY => {
            let time_utc = p.get_u32_le();
            let size = p.get_u32_le();
            let id = p.get_u16_le();
            let num_logs = p.get_u16_le();
            let last_log_num = p.get_u16_le();
            Message::Inbound(InboundMessage::LogEntry(LogEntryRaw {
                id,
                num_logs,
                last_log_num,
                time_utc,
                size,
            }))
        }
        MSG_ID_LOG_REQUEST_DATA => {
            let ofs = p.get_u32_le();
            let count = p.get_u32_le();
            let id = p.get_u16_le();
            let target = Target::new(p.get_u8(), p.get_u8());
            Message::Outbound(OutboundMessage::RequestData {
                target,
                id,
                ofs,
                count,
            })
        }
        MSG_ID_LOG_DATA => {
            let ofs = p.get_u32_le();
            let id = p.get_u16_le();
            let count = u32::from(p.get_u8());
            let data = p.copy_to_bytes(LOG_DATA_CAPACITY);
            Message::Inbound(InboundMessage::LogData(LogDataRaw {
                id,
                ofs,
                count,
                data,
            }))
        }
        MSG_ID_LOG_REQUEST_END => {
            let target = Target::new(p.get_u8(), p.get_u8());
            Message::Outbound(OutboundMessage::RequestEnd { target })
        }
        _ => return None,
    };
    Some(message)
}

// ── Decoder ──────────────────────────────────────────────────────────

enum Parsed {
    Frame(Frame),
    Unknown,
    Corrupt,
}

/// Incremental, resynchronising frame decoder.
///
/// Feed raw bytes with [`push`](Self::push), then drain frames with
/// [`next_frame`](Self::next_frame) until it returns `None`.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    dropped_bytes: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes discarded while hunting for a valid frame.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let Some(start) = self.buf.iter().position(|&b| b == STX_V2 || b == STX_V1) else {
                self.discard(self.buf.len());
                return None;
            };
            self.discard(start);

            let stx = *self.buf.first()?;
            let payload_len = usize::from(*self.buf.get(1)?);
            let (header_len, signed) = if stx == STX_V2 {
                let incompat = *self.buf.get(2)?;
                (V2_HEADER_LEN, incompat & INCOMPAT_SIGNED != 0)
            } else {
                (V1_HEADER_LEN, false)
            };
            let total = header_len
                + payload_len
                + CHECKSUM_LEN
                + if signed { SIGNATURE_LEN } else { 0 };
            if self.buf.len() < total {
                return None;
            }

            match parse_frame(self.buf.get(..total)?, stx, header_len, payload_len) {
                Parsed::Frame(frame) => {
                    self.buf.advance(total);
                    return Some(frame);
                }
                Parsed::Unknown | Parsed::Corrupt => self.discard(1),
            }
        }
    }

    fn discard(&mut self, n: usize) {
        self.buf.advance(n);
        self.dropped_bytes = self
            .dropped_bytes
            .saturating_add(u64::try_from(n).unwrap_or(u64::MAX));
    }
}

fn parse_frame(raw: &[u8], stx: u8, header_len: usize, payload_len: usize) -> Parsed {
    let header = raw.get(..header_len).unwrap_or_default();
    let (sequence, system_id, component_id, msg_id) = match (stx, header) {
        (STX_V2, [_, _, _, _, seq, sys, comp, id0, id1, id2]) => {
            (*seq, *sys, *comp, u32::from_le_bytes([*id0, *id1, *id2, 0]))
        }
        (STX_V1, [_, _, seq, sys, comp, id]) => (*seq, *sys, *comp, u32::from(*id)),
        _ => return Parsed::Corrupt,
    };

    let crc_end = header_len + payload_len;
    let Some(layout) = layout_for(msg_id) else {
        return Parsed::Unknown;
    };
    let (Some(covered), Some(&[ck_a, ck_b])) = (raw.get(1..crc_end), raw.get(crc_end..crc_end + 2))
    else {
        return Parsed::Corrupt;
    };
    if frame_checksum(covered, layout.crc_extra) != u16::from_le_bytes([ck_a, ck_b]) {
        return Parsed::Corrupt;
    }
    if payload_len > layout.payload_len {
        return Parsed::Corrupt;
    }

    // Restore the zero bytes v2 truncated away.
    let mut payload = vec![0u8; layout.payload_len];
    if let (Some(dst), Some(src)) = (
        payload.get_mut(..payload_len),
        raw.get(header_len..crc_end),
    ) {
        dst.copy_from_slice(src);
    }

    match read_payload(msg_id, &payload) {
        Some(message) => Parsed::Frame(Frame {
            sequence,
            sender: Target::new(system_id, component_id),
            message,
        }),
        None => Parsed::Unknown,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const GCS: Target = Target::new(255, 190);

    fn roundtrip(message: Message) -> Frame {
        let bytes = encode(7, GCS, &message).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);
        decoder.next_frame().unwrap()
    }

    #[test]
    fn crc_known_answer() {
        assert_eq!(crc_x25(b"123456789"), 0x6F91);
    }

    #[test]
    fn crc_extra_is_folded_in_last() {
        let covered = b"123456789";
        let mut with_extra = covered.to_vec();
        with_extra.push(50);
        assert_eq!(frame_checksum(covered, 50), crc_x25(&with_extra));
    }

    #[test]
    fn request_end_frame_layout() {
        let msg = Message::from(OutboundMessage::RequestEnd {
            target: Target::new(1, 1),
        });
        let bytes = encode(3, GCS, &msg).unwrap();
        assert_eq!(bytes.len(), V2_HEADER_LEN + 2 + CHECKSUM_LEN);
        assert_eq!(&bytes[..10], &[0xFD, 2, 0, 0, 3, 255, 190, 122, 0, 0]);
        assert_eq!(&bytes[10..12], &[1, 1]);
    }

    #[test]
    fn trailing_zeros_are_truncated_and_restored() {
        let msg = Message::from(OutboundMessage::RequestList {
            target: Target::new(0, 0),
            start: 5,
            end: 0,
        });
        let bytes = encode(0, GCS, &msg).unwrap();
        // start=5 is the only non-zero byte
        assert_eq!(bytes[1], 1);
        assert_eq!(roundtrip(msg.clone()).message, msg);
    }

    #[test]
    fn log_data_keeps_count_and_pads_payload() {
        let msg = Message::from(InboundMessage::LogData(LogDataRaw {
            id: 3,
            ofs: 180,
            count: 4,
            data: Bytes::from_static(&[1, 2, 3, 4]),
        }));
        let frame = roundtrip(msg);
        let Message::Inbound(InboundMessage::LogData(data)) = frame.message else {
            panic!("expected LOG_DATA, got {:?}", frame.message);
        };
        assert_eq!((data.id, data.ofs, data.count), (3, 180, 4));
        assert_eq!(data.data.len(), LOG_DATA_CAPACITY);
        assert_eq!(&data.data[..4], &[1, 2, 3, 4]);
        assert!(data.data[4..].iter().all(|&b| b == 0));
        assert_eq!(frame.sender, GCS);
        assert_eq!(frame.sequence, 7);
    }

    #[test]
    fn oversized_log_data_is_rejected() {
        let msg = Message::from(InboundMessage::LogData(LogDataRaw {
            id: 1,
            ofs: 0,
            count: 200,
            data: Bytes::from(vec![0xAB; 200]),
        }));
        let err = encode(0, GCS, &msg).unwrap_err();
        assert!(err.is_rejected_frame(), "unexpected error: {err}");
    }

    #[test]
    fn decoder_resyncs_after_garbage_and_bad_checksum() {
        let entry = Message::from(InboundMessage::LogEntry(LogEntryRaw {
            id: 2,
            num_logs: 4,
            last_log_num: 4,
            time_utc: 1_700_000_000,
            size: 4096,
        }));
        let good = encode(1, Target::new(1, 1), &entry).unwrap();
        let mut corrupted = good.to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;

        let mut decoder = FrameDecoder::new();
        decoder.push(&[0x00, 0x13, 0x37]);
        decoder.push(&corrupted);
        decoder.push(&good);

        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame.message, entry);
        assert!(decoder.next_frame().is_none());
        assert!(decoder.dropped_bytes() >= 3);
    }

    #[test]
    fn decoder_waits_for_split_frame() {
        let msg = Message::from(OutboundMessage::RequestData {
            target: Target::new(1, 1),
            id: 9,
            ofs: 90,
            count: 900,
        });
        let bytes = encode(0, GCS, &msg).unwrap();
        let (head, tail) = bytes.split_at(5);

        let mut decoder = FrameDecoder::new();
        decoder.push(head);
        assert!(decoder.next_frame().is_none());
        decoder.push(tail);
        assert_eq!(decoder.next_frame().unwrap().message, msg);
    }

    #[test]
    fn decodes_v1_frames() {
        // v1 LOG_REQUEST_END from 255/190 to 1/1
        let mut raw = vec![STX_V1, 2, 0, 255, 190, 122, 1, 1];
        let crc = frame_checksum(&raw[1..], 203);
        raw.extend_from_slice(&crc.to_le_bytes());

        let mut decoder = FrameDecoder::new();
        decoder.push(&raw);
        let frame = decoder.next_frame().unwrap();
        assert_eq!(
            frame.message,
            Message::from(OutboundMessage::RequestEnd {
                target: Target::new(1, 1)
            })
        );
    }

    #[test]
    fn unknown_message_ids_are_skipped() {
        // HEARTBEAT (id 0) followed by a frame we understand
        let mut raw = vec![STX_V2, 1, 0, 0, 0, 1, 1, 0, 0, 0, 6, 0, 0];
        let end = Message::from(OutboundMessage::RequestEnd {
            target: Target::new(1, 1),
        });
        raw.extend_from_slice(&encode(1, GCS, &end).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.push(&raw);
        assert_eq!(decoder.next_frame().unwrap().message, end);
    }

    #[test]
    fn stray_start_byte_does_not_swallow_following_frame() {
        // Leftover v2 header for an id we do not decode, claiming 20 payload
        // bytes that overlap the real frame behind it.
        let mut raw = vec![STX_V2, 20, 0, 0, 0, 1, 1, 0, 0, 0];
        let entry = Message::from(InboundMessage::LogEntry(LogEntryRaw {
            id: 1,
            num_logs: 3,
            last_log_num: 3,
            time_utc: 1_700_000_000,
            size: 1000,
        }));
        let good = encode(4, Target::new(1, 1), &entry).unwrap();
        assert!(raw.len() + good.len() >= V2_HEADER_LEN + 20 + CHECKSUM_LEN);
        raw.extend_from_slice(&good);

        let mut decoder = FrameDecoder::new();
        decoder.push(&raw);
        assert_eq!(decoder.next_frame().unwrap().message, entry);
        assert_eq!(decoder.dropped_bytes(), 10);
        assert!(decoder.next_frame().is_none());
    }
}
