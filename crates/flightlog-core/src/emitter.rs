// ── Command emitter ──
//
// Builds the three log-transfer commands for the configured target and
// hands them to the link. One attempt per call; failures are logged and
// returned, never retried.

use std::sync::Arc;

use flightlog_link::{Link, OutboundMessage, Target};
use tracing::{debug, error};

use crate::error::SendFailure;
use crate::model::{DataRequest, ListRequest};

#[derive(Clone)]
pub struct CommandEmitter {
    link: Arc<dyn Link>,
    target: Target,
}

impl std::fmt::Debug for CommandEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEmitter")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl CommandEmitter {
    pub fn new(link: Arc<dyn Link>, target: Target) -> Self {
        Self { link, target }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn request_list(&self, request: &ListRequest) -> Result<(), SendFailure> {
        self.emit(OutboundMessage::RequestList {
            target: self.target,
            start: request.start_id,
            end: request.end_id,
        })
    }

    pub fn request_data(&self, request: &DataRequest) -> Result<(), SendFailure> {
        self.emit(OutboundMessage::RequestData {
            target: self.target,
            id: request.id,
            ofs: request.offset,
            count: request.count,
        })
    }

    pub fn request_stop(&self) -> Result<(), SendFailure> {
        self.emit(OutboundMessage::RequestEnd {
            target: self.target,
        })
    }

    fn emit(&self, message: OutboundMessage) -> Result<(), SendFailure> {
        let command = message.kind();
        match self.link.send(&message) {
            Ok(()) => {
                debug!(%command, vehicle = %self.target, "command sent");
                Ok(())
            }
            Err(e) => {
                error!(%command, vehicle = %self.target, error = %e, "command send failed");
                Err(SendFailure::new(command, &e))
            }
        }
    }
}
