use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::CanFrame;
use crate::message_layout::{DecodedSignal, MessageLayout};
use crate::result_buffer;

/// Read-only table of the messages known on a bus, keyed by frame id.
///
/// Several layouts may share an id as long as their byte lengths differ; the
/// frame's dlc selects between them.
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    messages: &'static [&'static MessageLayout],
}

impl Registry {
    pub const fn new(messages: &'static [&'static MessageLayout]) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &'static [&'static MessageLayout] {
        self.messages
    }

    pub fn by_name(&self, name: &str) -> Option<&'static MessageLayout> {
        self.messages.iter().copied().find(|layout| layout.name == name)
    }

    /// Find the layout a frame with this id and dlc decodes under.
    pub fn lookup(&self, id: u32, dlc: u8) -> Result<&'static MessageLayout> {
        let mut same_id = self.messages.iter().copied().filter(|layout| layout.id == id);
        let Some(first) = same_id.next() else {
            debug!("unknown message id {id:#X}");
            return Err(Error::UnknownMessage { id });
        };
        if first.byte_length == dlc {
            return Ok(first);
        }
        if let Some(layout) = same_id.find(|layout| layout.byte_length == dlc) {
            return Ok(layout);
        }
        debug!(
            expected = first.byte_length,
            actual = dlc,
            "length of frame {id:#X} does not match any layout"
        );
        Err(Error::LengthMismatch {
            id,
            expected: first.byte_length,
            actual: dlc,
        })
    }

    /// Decode a frame into a freshly allocated result owned by the caller.
    pub fn decode(&self, frame: &CanFrame) -> Result<Vec<DecodedSignal>> {
        let layout = self.lookup(frame.id, frame.dlc)?;
        Ok(result_buffer::allocate(layout, frame))
    }

    /// Decode a frame into a caller supplied buffer, starting at index 0.
    /// Returns the number of signals written.
    ///
    /// Size the buffer with the message's `MessageKind::SIGNAL_COUNT`. On any
    /// error the buffer is left untouched.
    pub fn decode_into(&self, frame: &CanFrame, out: &mut [DecodedSignal]) -> Result<usize> {
        let layout = self.lookup(frame.id, frame.dlc)?;
        result_buffer::write_in_place(layout, frame, out)
    }
}
