use std::time::Duration;

use crate::measurement::SequenceStep;

pub mod codec;
pub mod command;
pub mod conv;
pub mod response;
pub mod serial;

#[cfg(test)]
pub mod fake;

use thiserror::Error;

/// Wait after every write before the next transport operation.
pub const COMMUNICATION_DELAY: Duration = Duration::from_millis(350);

/// Additional wait after every configuration command for the range relays.
pub const RANGE_SWITCH_DELAY: Duration = Duration::from_millis(1000);

/// Size of the buffer used for a single bounded reply read.
pub const READ_BUFFER_LEN: usize = 100;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("Serial I/O error: {0:?}")]
    Serial(#[from] tokio_serial::Error),

    #[error("Unable to interpret device reply: {reply:?}")]
    Parse { reply: String },

    #[error("Device sent no complete reply")]
    NoReply,

    #[error("Measurement sequence aborted at {step}: {source}")]
    SequenceAbort {
        step: SequenceStep,
        source: Box<ProtoError>,
    },
}

impl ProtoError {
    /// True for failures at the transport boundary, as opposed to
    /// replies that could not be interpreted.
    pub fn is_transport(&self) -> bool {
        match self {
            ProtoError::Io(_) | ProtoError::Serial(_) | ProtoError::NoReply => true,
            ProtoError::Parse { .. } => false,
            ProtoError::SequenceAbort { source, .. } => source.is_transport(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtoError>;
