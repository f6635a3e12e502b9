//! Simulated vehicle.
//!
//! A [`Link`] that behaves like an autopilot with a handful of onboard
//! logs: LOG_REQUEST_LIST is answered with LOG_ENTRY records and
//! LOG_REQUEST_DATA with 90-byte LOG_DATA chunks, the way ArduPilot and
//! PX4 answer them. Every reply goes through the MAVLink codec before it is
//! delivered, so the framing is exercised end to end.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::codec::{self, FrameDecoder};
use crate::error::LinkError;
use crate::message::{
    InboundMessage, LOG_DATA_CAPACITY, LogDataRaw, LogEntryRaw, Message, OutboundMessage, Target,
};
use crate::transport::{INBOUND_CHANNEL_CAPACITY, Link};

const SAMPLE_EPOCH: u32 = 1_700_000_000;

/// One log stored on the simulated vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedLog {
    pub id: u16,
    pub time_utc: u32,
    pub data: Bytes,
}

impl SimulatedLog {
    /// A log filled with a deterministic byte pattern.
    pub fn patterned(id: u16, size: usize) -> Self {
        let data: Vec<u8> = (0..size)
            .map(|i| u8::try_from((i * 31 + usize::from(id) * 7) % 251).unwrap_or_default())
            .collect();
        Self {
            id,
            time_utc: SAMPLE_EPOCH + u32::from(id) * 3600,
            data: Bytes::from(data),
        }
    }
}

pub struct SimulatedVehicle {
    identity: Target,
    logs: Vec<SimulatedLog>,
    sequence: AtomicU8,
    sent: Mutex<Vec<OutboundMessage>>,
    inbound_tx: broadcast::Sender<Arc<InboundMessage>>,
}

impl SimulatedVehicle {
    /// Logs must be sorted by id; ids are expected to start at 1.
    pub fn new(identity: Target, logs: Vec<SimulatedLog>) -> Self {
        // Whole-log replies are pushed synchronously, so size the channel
        // to hold the largest log without lagging subscribers.
        let largest_chunks = logs
            .iter()
            .map(|log| log.data.len().div_ceil(LOG_DATA_CAPACITY) + 1)
            .max()
            .unwrap_or(0);
        let (inbound_tx, _) =
            broadcast::channel(INBOUND_CHANNEL_CAPACITY.max(largest_chunks + logs.len()));
        Self {
            identity,
            logs,
            sequence: AtomicU8::new(0),
            sent: Mutex::new(Vec::new()),
            inbound_tx,
        }
    }

    /// `count` logs with ids `1..=count`, log `n` being `n * size` bytes.
    pub fn with_sample_logs(identity: Target, count: u16, size: usize) -> Self {
        let logs = (1..=count)
            .map(|id| SimulatedLog::patterned(id, size * usize::from(id)))
            .collect();
        Self::new(identity, logs)
    }

    pub fn logs(&self) -> &[SimulatedLog] {
        &self.logs
    }

    /// Commands received so far.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn answer_list(&self, start: u16, end: u16) {
        let Some(last) = self.logs.last() else {
            // MAVLink convention for "no logs".
            self.emit(InboundMessage::LogEntry(LogEntryRaw {
                id: 0,
                num_logs: 0,
                last_log_num: 0,
                time_utc: 0,
                size: 0,
            }));
            return;
        };

        let num_logs = u16::try_from(self.logs.len()).unwrap_or(u16::MAX);
        for log in self.logs.iter().filter(|l| l.id >= start && l.id <= end) {
            self.emit(InboundMessage::LogEntry(LogEntryRaw {
                id: log.id,
                num_logs,
                last_log_num: last.id,
                time_utc: log.time_utc,
                size: u32::try_from(log.data.len()).unwrap_or(u32::MAX),
            }));
        }
    }

    fn answer_data(&self, id: u16, ofs: u32, count: u32) {
        let Some(log) = self.logs.iter().find(|l| l.id == id) else {
            debug!(id, "simulated vehicle has no such log");
            return;
        };

        let size = log.data.len();
        let start = usize::try_from(ofs).unwrap_or(usize::MAX).min(size);
        let wanted = usize::try_from(count).unwrap_or(usize::MAX);
        let end = start.saturating_add(wanted).min(size);

        let mut pos = start;
        while pos < end {
            let len = (end - pos).min(LOG_DATA_CAPACITY);
            self.emit_chunk(id, pos, log.data.slice(pos..pos + len));
            pos += len;
        }

        // Past the end of the log, or a full-chunk tail: tell the reader
        // with an empty chunk.
        let reached_eof = end == size && start.saturating_add(wanted) > size;
        if start == end || (reached_eof && (end - start) % LOG_DATA_CAPACITY == 0) {
            self.emit_chunk(id, end, Bytes::new());
        }
    }

    fn emit_chunk(&self, id: u16, ofs: usize, data: Bytes) {
        self.emit(InboundMessage::LogData(LogDataRaw {
            id,
            ofs: u32::try_from(ofs).unwrap_or(u32::MAX),
            count: u32::try_from(data.len()).unwrap_or(u32::MAX),
            data,
        }));
    }

    fn emit(&self, message: InboundMessage) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let frame = match codec::encode(sequence, self.identity, &Message::from(message)) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "simulated vehicle could not encode reply");
                return;
            }
        };

        let mut decoder = FrameDecoder::new();
        decoder.push(&frame);
        if let Some(codec::Frame {
            message: Message::Inbound(msg),
            ..
        }) = decoder.next_frame()
        {
            let _ = self.inbound_tx.send(Arc::new(msg));
        }
    }
}

impl Link for SimulatedVehicle {
    fn send(&self, message: &OutboundMessage) -> Result<(), LinkError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*message);

        if message.target().system_id != self.identity.system_id {
            debug!(vehicle = %message.target(), "command not addressed to simulated vehicle");
            return Ok(());
        }

        match *message {
            OutboundMessage::RequestList { start, end, .. } => self.answer_list(start, end),
            OutboundMessage::RequestData { id, ofs, count, .. } => self.answer_data(id, ofs, count),
            OutboundMessage::RequestEnd { .. } => debug!("simulated vehicle ended log transfer"),
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<InboundMessage>> {
        self.inbound_tx.subscribe()
    }
}
