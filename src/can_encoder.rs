use anyhow::{anyhow, Result};

use crate::frame::CanFrame;
use crate::message_layout::MessageLayout;
use crate::scaling::physical_to_raw;

/// Encode raw signal values, in schema order, into `frame`.
///
/// Sets id and dlc from the layout, clears the bits of every signal and packs
/// each value in layout order. Bits no signal owns keep their current value.
/// Values wider than their signal are truncated to its width. Signals past
/// the end of `raw_values` encode as raw zero; extra values are ignored.
pub fn encode_raw(layout: &MessageLayout, raw_values: &[u64], frame: &mut CanFrame) {
    frame.id = layout.id;
    frame.dlc = layout.byte_length;
    let cleared = u64::from_le_bytes(frame.data) & !layout.occupancy();
    frame.data = cleared.to_le_bytes();
    for (signal, raw) in layout.signals.iter().zip(raw_values) {
        signal.pack(&mut frame.data, *raw);
    }
}

/// Builder for constructing encoded CAN frames signal-by-signal.
///
/// Uses the consuming-self pattern so that each `.set_raw()` call moves
/// the builder, preventing accidental reuse of a half-built frame. Signals
/// never set encode as raw zero.
pub struct FrameBuilder {
    layout: &'static MessageLayout,
    frame: CanFrame,
}

impl FrameBuilder {
    pub fn new(layout: &'static MessageLayout) -> Self {
        let frame = CanFrame {
            id: layout.id,
            dlc: layout.byte_length,
            ..Default::default()
        };
        Self { layout, frame }
    }

    /// Set a signal's raw value by name. Returns Err if the signal name is not found.
    pub fn set_raw(mut self, signal_name: &str, raw: u64) -> Result<Self> {
        let signal = self
            .layout
            .signal(signal_name)
            .ok_or_else(|| anyhow!("unknown signal {} in {}", signal_name, self.layout.name))?;
        signal.pack(&mut self.frame.data, raw);
        Ok(self)
    }

    /// Set a signal from a physical value, inverting its scaling first.
    pub fn set_physical(self, signal_name: &str, physical_value: f64) -> Result<Self> {
        let signal = self
            .layout
            .signal(signal_name)
            .ok_or_else(|| anyhow!("unknown signal {} in {}", signal_name, self.layout.name))?;
        let raw = physical_to_raw(physical_value, signal);
        self.set_raw(signal_name, raw)
    }

    /// Consume the builder and produce the finished frame.
    pub fn build(self) -> CanFrame {
        self.frame
    }
}
