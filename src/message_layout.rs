/*!
 * Static message layouts and the per-message typed surface
 */

use crate::can_encoder;
use crate::frame::CanFrame;
use crate::signal_layout::SignalLayout;

/// A CAN message: identifier, payload length and its signals in schema order.
///
/// Layouts are `const` items built ahead of time. Signal order is both the
/// decode output order and the field order of the message's encode struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageLayout {
    pub id: u32,
    pub name: &'static str,
    pub byte_length: u8,
    pub signals: &'static [SignalLayout],
}

impl MessageLayout {
    pub fn signal(&self, name: &str) -> Option<&'static SignalLayout> {
        self.signals.iter().find(|signal| signal.name == name)
    }

    pub const fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Frame bits owned by any signal of the message.
    pub fn occupancy(&self) -> u64 {
        self.signals
            .iter()
            .fold(0, |acc, signal| acc | signal.occupancy())
    }

    /// Checks every signal fits the declared length. Usable in `const`
    /// context so that tables are rejected at build time.
    pub const fn is_well_formed(&self) -> bool {
        if self.byte_length as usize > crate::frame::CAN_MAX_DATA_LEN {
            return false;
        }
        let mut i = 0;
        while i < self.signals.len() {
            if !self.signals[i].fits_in(self.byte_length) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Whether two signals claim the same frame bit.
    pub fn has_overlap(&self) -> bool {
        let mut seen = 0u64;
        for signal in self.signals {
            let bits = signal.occupancy();
            if seen & bits != 0 {
                return true;
            }
            seen |= bits;
        }
        false
    }
}

/// One decoded signal. Name, unit and topic point into the static schema.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodedSignal {
    pub name: &'static str,
    pub unit: &'static str,
    pub topic: &'static str,
    pub value: f64,
}

impl DecodedSignal {
    pub fn new(signal: &SignalLayout, value: f64) -> Self {
        Self {
            name: signal.name,
            unit: signal.unit,
            topic: signal.topic,
            value,
        }
    }
}

/// Typed encode surface of one message kind.
///
/// Implementors are plain structs with one field per signal in schema order,
/// so two same-typed values cannot be swapped silently.
pub trait MessageKind {
    const LAYOUT: &'static MessageLayout;

    /// Number of signals a decode of this message produces. Use it to size a
    /// buffer for `Registry::decode_into`.
    const SIGNAL_COUNT: usize = Self::LAYOUT.signals.len();

    /// Raw values in schema order, widened to u64.
    type Raw: AsRef<[u64]>;

    fn raw_values(&self) -> Self::Raw;

    /// Encode into a fresh, zeroed frame.
    fn encode(&self) -> CanFrame {
        let mut frame = CanFrame::default();
        self.encode_into(&mut frame);
        frame
    }

    /// Encode into an existing frame. Bits outside the message's signals
    /// keep their current value.
    fn encode_into(&self, frame: &mut CanFrame) {
        can_encoder::encode_raw(Self::LAYOUT, self.raw_values().as_ref(), frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus;

    #[test]
    fn test_signal_lookup_by_name() {
        let speed = bus::ENGINE_STATUS.signal("EngineSpeed").unwrap();
        assert_eq!(speed.unit, "RPM");
        assert_eq!(speed.topic, "Engine/Metrics/Speed");
        assert!(bus::ENGINE_STATUS.signal("OilPressure").is_none());
    }

    #[test]
    fn test_bus_layouts_are_well_formed_and_disjoint() {
        for message in bus::MESSAGES {
            assert!(message.is_well_formed(), "{} does not fit", message.name);
            assert!(!message.has_overlap(), "{} has overlapping signals", message.name);
        }
    }

    #[test]
    fn test_malformed_layout_is_detected() {
        const TOO_SHORT: MessageLayout = MessageLayout {
            id: 0x10,
            name: "TooShort",
            byte_length: 2,
            signals: &[SignalLayout {
                name: "Wide",
                unit: "",
                topic: "",
                start_bit: 7,
                bit_length: 24,
                byte_order: crate::signal_layout::ByteOrder::BigEndian,
                value_type: crate::signal_layout::ValueType::Unsigned,
                scale: 1.0,
                offset: 0.0,
            }],
        };
        assert!(!TOO_SHORT.is_well_formed());
    }

    #[test]
    fn test_occupancy_of_engine_status() {
        // EngineSpeed owns bytes 0..=3, BatteryTemperature byte 4 and the
        // high nibble of byte 5.
        assert_eq!(bus::ENGINE_STATUS.occupancy(), 0x0000_F0FF_FFFF_FFFF);
    }

    #[test]
    fn test_signal_count_constant() {
        assert_eq!(bus::EngineStatus::SIGNAL_COUNT, 2);
        assert_eq!(bus::SignedSamples::SIGNAL_COUNT, 8);
    }
}
