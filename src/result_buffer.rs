/*!
 * Destinations for decoded signals: engine allocated or caller supplied
 */

use crate::error::{Error, Result};
use crate::frame::CanFrame;
use crate::message_layout::{DecodedSignal, MessageLayout};

fn decoded<'a>(
    layout: &'static MessageLayout,
    frame: &'a CanFrame,
) -> impl Iterator<Item = DecodedSignal> + 'a {
    layout
        .signals
        .iter()
        .map(move |signal| DecodedSignal::new(signal, signal.decode(&frame.data)))
}

/// Owned mode. The returned vector holds exactly one entry per signal.
pub fn allocate(layout: &'static MessageLayout, frame: &CanFrame) -> Vec<DecodedSignal> {
    let mut signals = Vec::with_capacity(layout.signals.len());
    signals.extend(decoded(layout, frame));
    signals
}

/// Borrowed mode. Writes one entry per signal from index 0 and returns the
/// count. Entries past the count are not touched, and nothing is written
/// when `out` is too short.
///
/// Slots may be any type built from a `DecodedSignal`, such as the C ABI
/// signal record.
pub fn write_in_place<T: From<DecodedSignal>>(
    layout: &'static MessageLayout,
    frame: &CanFrame,
    out: &mut [T],
) -> Result<usize> {
    let needed = layout.signals.len();
    if out.len() < needed {
        return Err(Error::BufferTooSmall {
            needed,
            capacity: out.len(),
        });
    }
    for (slot, signal) in out.iter_mut().zip(decoded(layout, frame)) {
        *slot = T::from(signal);
    }
    Ok(needed)
}
