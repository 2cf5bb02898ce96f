/*!
 * Defines the layout in bits of a signal so that it can be reused to pack/unpack into bytes
 */

use crate::frame::CAN_MAX_DATA_LEN;
use crate::scaling;

/// Bit-numbering convention of a signal, as written in a DBC `@0`/`@1` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Intel. `start_bit` is the LSB, counted upward from bit 0 of byte 0.
    LittleEndian,
    /// Motorola. `start_bit` is the MSB; bits run downward within a byte and
    /// continue at bit 7 of the next byte.
    BigEndian,
}

/// How the raw bits of a signal are read as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Unsigned,
    /// Two's complement of `bit_length` bits.
    Signed,
    /// IEEE-754 single, raw value is the 32 bit pattern.
    Float32,
    /// IEEE-754 double, raw value is the 64 bit pattern.
    Float64,
    /// Unsigned fixed point, `integer + decimal` bits wide. The raw value
    /// counts units of `2^-decimal`.
    FixedPoint { integer: u8, decimal: u8 },
}

impl ValueType {
    pub const fn is_signed(self) -> bool {
        matches!(self, ValueType::Signed)
    }
}

/// One contiguous span of bits within a single byte of the CAN frame data.
///
/// Describes a mapping: "take `num_bits` consecutive bits starting at
/// `bit_offset` in `data[byte_index]`, and place them at `value_shift`
/// in the raw u64 value."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSpan {
    pub byte_index: usize,
    /// Lowest bit position within the byte (0..=7).
    pub bit_offset: u8,
    /// How many consecutive bits in this span (1..=8).
    pub num_bits: u8,
    /// Where these bits land in the raw u64, LSB-relative.
    /// i.e., the extracted bits are shifted left by this amount.
    pub value_shift: u8,
}

impl BitSpan {
    fn mask(&self) -> u8 {
        ((1u16 << self.num_bits) - 1) as u8
    }
}

/// Walks the byte spans of a bitfield.
///
/// This is the single source of truth for how start_bit + byte_order maps to
/// physical byte/bit positions in the frame. `extract` and `pack` both consume
/// it, so they are inverses by construction. A 64-bit field yields at most
/// 9 spans.
#[derive(Debug, Clone)]
pub struct BitSpans {
    byte_order: ByteOrder,
    byte_index: usize,
    bit_index: u8,
    remaining: u8,
    value_shift: u8,
}

impl BitSpans {
    pub fn new(start_bit: u8, bit_length: u8, byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            byte_index: (start_bit / 8) as usize,
            bit_index: start_bit % 8,
            remaining: bit_length,
            value_shift: 0,
        }
    }
}

impl Iterator for BitSpans {
    type Item = BitSpan;

    fn next(&mut self) -> Option<BitSpan> {
        if self.remaining == 0 {
            return None;
        }
        let span = match self.byte_order {
            ByteOrder::BigEndian => {
                // First bits walked are the MSB of the raw value.
                let num_bits = std::cmp::min(self.bit_index + 1, self.remaining);
                self.remaining -= num_bits;
                BitSpan {
                    byte_index: self.byte_index,
                    bit_offset: self.bit_index + 1 - num_bits,
                    num_bits,
                    value_shift: self.remaining,
                }
            }
            ByteOrder::LittleEndian => {
                // First bits walked are the LSB of the raw value.
                let num_bits = std::cmp::min(8 - self.bit_index, self.remaining);
                let span = BitSpan {
                    byte_index: self.byte_index,
                    bit_offset: self.bit_index,
                    num_bits,
                    value_shift: self.value_shift,
                };
                self.value_shift += num_bits;
                self.remaining -= num_bits;
                span
            }
        };
        self.byte_index += 1;
        self.bit_index = match self.byte_order {
            ByteOrder::BigEndian => 7,
            ByteOrder::LittleEndian => 0,
        };
        Some(span)
    }
}

/// Extract the raw unsigned value of a bitfield from the frame data bytes.
///
/// # Panics
/// If the field reaches past the 8 byte buffer. Layout tables are checked
/// against their message length when they are built.
pub fn extract(
    data: &[u8; CAN_MAX_DATA_LEN],
    start_bit: u8,
    bit_length: u8,
    byte_order: ByteOrder,
) -> u64 {
    let mut result: u64 = 0;
    for span in BitSpans::new(start_bit, bit_length, byte_order) {
        let bits = (data[span.byte_index] >> span.bit_offset) & span.mask();
        result |= (bits as u64) << span.value_shift;
    }
    result
}

/// Pack the low `bit_length` bits of `raw` into the frame data bytes.
///
/// Clears the target bits before writing so that several signals can share
/// a byte; bits outside the field are left untouched. Bits of `raw` above
/// `bit_length` are dropped.
///
/// # Panics
/// If the field reaches past the 8 byte buffer.
pub fn pack(
    data: &mut [u8; CAN_MAX_DATA_LEN],
    start_bit: u8,
    bit_length: u8,
    byte_order: ByteOrder,
    raw: u64,
) {
    for span in BitSpans::new(start_bit, bit_length, byte_order) {
        let mask = span.mask();
        let bits = ((raw >> span.value_shift) as u8) & mask;
        data[span.byte_index] &= !(mask << span.bit_offset);
        data[span.byte_index] |= bits << span.bit_offset;
    }
}

/// Frame bits covered by a field: bit `byte * 8 + n` is set when bit `n` of
/// `data[byte]` belongs to the field.
pub fn occupancy(start_bit: u8, bit_length: u8, byte_order: ByteOrder) -> u64 {
    BitSpans::new(start_bit, bit_length, byte_order)
        .filter(|span| span.byte_index < CAN_MAX_DATA_LEN)
        .fold(0u64, |acc, span| {
            acc | ((span.mask() as u64) << (span.byte_index * 8 + span.bit_offset as usize))
        })
}

/// Index of the last frame byte touched by a field.
pub const fn last_byte(start_bit: u8, bit_length: u8, byte_order: ByteOrder) -> usize {
    let start = start_bit as usize;
    let len = bit_length as usize;
    match byte_order {
        ByteOrder::LittleEndian => (start + len.saturating_sub(1)) / 8,
        ByteOrder::BigEndian => {
            let in_first_byte = start % 8 + 1;
            if len <= in_first_byte {
                start / 8
            } else {
                start / 8 + (len - in_first_byte).div_ceil(8)
            }
        }
    }
}

/// Sign-extend the low `bit_length` bits of `raw` to a full i64.
pub const fn sign_extend(raw: u64, bit_length: u8) -> i64 {
    if bit_length == 0 || bit_length > 64 {
        return raw as i64;
    }
    let shift_len = 64 - bit_length as u32;
    ((raw as i64) << shift_len) >> shift_len
}

/// Read extracted raw bits as the number they encode, before scaling.
pub fn interpret(raw: u64, bit_length: u8, value_type: ValueType) -> f64 {
    match value_type {
        ValueType::Unsigned => raw as f64,
        ValueType::Signed => sign_extend(raw, bit_length) as f64,
        ValueType::Float32 => f32::from_bits(raw as u32) as f64,
        ValueType::Float64 => f64::from_bits(raw),
        ValueType::FixedPoint { decimal, .. } => raw as f64 / fixed_point_unit(decimal),
    }
}

/// Number of raw units in 1.0 for a fixed point signal with `decimal`
/// fractional bits.
pub fn fixed_point_unit(decimal: u8) -> f64 {
    2f64.powi(decimal as i32)
}

/// Static description of one signal inside a message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalLayout {
    pub name: &'static str,
    pub unit: &'static str,
    pub topic: &'static str,
    pub start_bit: u8,
    pub bit_length: u8,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    pub scale: f64,
    pub offset: f64,
}

impl SignalLayout {
    pub fn spans(&self) -> BitSpans {
        BitSpans::new(self.start_bit, self.bit_length, self.byte_order)
    }

    pub fn extract(&self, data: &[u8; CAN_MAX_DATA_LEN]) -> u64 {
        extract(data, self.start_bit, self.bit_length, self.byte_order)
    }

    pub fn pack(&self, data: &mut [u8; CAN_MAX_DATA_LEN], raw: u64) {
        pack(data, self.start_bit, self.bit_length, self.byte_order, raw)
    }

    pub fn occupancy(&self) -> u64 {
        occupancy(self.start_bit, self.bit_length, self.byte_order)
    }

    /// Mask of the raw value bits this signal can carry.
    pub const fn raw_mask(&self) -> u64 {
        if self.bit_length >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bit_length) - 1
        }
    }

    /// Whether the field lies inside a frame of `byte_length` bytes.
    pub const fn fits_in(&self, byte_length: u8) -> bool {
        self.bit_length >= 1
            && self.bit_length <= 64
            && byte_length as usize <= CAN_MAX_DATA_LEN
            && last_byte(self.start_bit, self.bit_length, self.byte_order) < byte_length as usize
    }

    /// Decode the signal from frame data, returning the physical value.
    ///
    /// Extracts the raw value, applies sign extension or float
    /// reinterpretation, then computes: physical = raw * scale + offset.
    pub fn decode(&self, data: &[u8; CAN_MAX_DATA_LEN]) -> f64 {
        let number = interpret(self.extract(data), self.bit_length, self.value_type);
        scaling::to_physical(number, self.scale, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus;
    use crate::candump::parse_candump_line;
    use crate::message_layout::MessageLayout;

    fn frame_data(line: &str) -> [u8; CAN_MAX_DATA_LEN] {
        parse_candump_line(line).unwrap().frame.data
    }

    fn signal(message: &MessageLayout, name: &str) -> SignalLayout {
        *message.signal(name).unwrap()
    }

    #[test]
    fn test_spans_little_endian_straddling() {
        // 12 bits from bit 4: high nibble of byte 0, all of byte 1
        let spans: Vec<BitSpan> = BitSpans::new(4, 12, ByteOrder::LittleEndian).collect();
        assert_eq!(
            spans,
            vec![
                BitSpan { byte_index: 0, bit_offset: 4, num_bits: 4, value_shift: 0 },
                BitSpan { byte_index: 1, bit_offset: 0, num_bits: 8, value_shift: 4 },
            ]
        );
    }

    #[test]
    fn test_spans_big_endian_straddling() {
        // 12 bits, MSB at bit 39 (byte 4 bit 7): all of byte 4, top nibble of byte 5
        let spans: Vec<BitSpan> = BitSpans::new(39, 12, ByteOrder::BigEndian).collect();
        assert_eq!(
            spans,
            vec![
                BitSpan { byte_index: 4, bit_offset: 0, num_bits: 8, value_shift: 4 },
                BitSpan { byte_index: 5, bit_offset: 4, num_bits: 4, value_shift: 0 },
            ]
        );
    }

    #[test]
    fn test_spans_64_bit_unaligned_is_nine_spans() {
        // A 64-bit LE field must start at bit 0 to fit, but the walk itself
        // handles any start. Starting mid-byte it needs 9 spans.
        assert_eq!(BitSpans::new(3, 64, ByteOrder::LittleEndian).count(), 9);
        assert_eq!(BitSpans::new(7, 64, ByteOrder::BigEndian).count(), 8);
    }

    #[test]
    fn test_extract_motohawk_temperature() {
        // Temperature: start_bit=0, size=12, big-endian, signed, factor=0.01, offset=250
        // Frame: A5B6D90000000000
        // Golden value from cantools: 244.14 degK
        // raw * 0.01 + 250 = 244.14 -> raw = (244.14 - 250)/0.01 = -586
        // -586 as signed 12-bit two's complement: 4096 - 586 = 3510 = 0xDB6
        let data = frame_data("(0.0) vcan0 1F0#A5B6D90000000000");
        let temperature = signal(&bus::EXAMPLE_MESSAGE, "Temperature");

        assert_eq!(temperature.extract(&data), 0xDB6);
        assert!((temperature.decode(&data) - 244.14).abs() < 1e-9);
    }

    #[test]
    fn test_extract_motohawk_average_radius() {
        // AverageRadius: start_bit=6, size=6, big-endian, unsigned, factor=0.1, offset=0
        // Golden value from cantools: 1.8 m -> raw = 1.8 / 0.1 = 18
        let data = frame_data("(0.0) vcan0 1F0#A5B6D90000000000");
        let radius = signal(&bus::EXAMPLE_MESSAGE, "AverageRadius");

        assert_eq!(radius.extract(&data), 18);
        assert!((radius.decode(&data) - 1.8).abs() < 1e-10);
    }

    #[test]
    fn test_extract_motohawk_enable() {
        // Enable: start_bit=7, size=1, big-endian, unsigned, factor=1, offset=0
        let data = frame_data("(0.0) vcan0 1F0#A5B6D90000000000");
        let enable = signal(&bus::EXAMPLE_MESSAGE, "Enable");
        assert_eq!(enable.extract(&data), 1);
    }

    #[test]
    fn test_extract_signed_signals() {
        // Frame: 11223344FF667788
        // Golden values from cantools, SignedSamples
        let data = frame_data("(0.0) vcan0 00A#11223344FF667788");

        let cases: &[(&str, f64)] = &[
            ("s3big", -1.0),
            ("s3", -1.0),
            ("s7", 8.0),
            ("s7big", 8.0),
            ("s8big", -111.0),
            ("s8", -47.0),
            ("s9", 25.0),
            ("s10big", 239.0),
        ];

        for (signal_name, expected) in cases {
            let decoded = signal(&bus::SIGNED_SAMPLES, signal_name).decode(&data);
            assert_eq!(
                decoded, *expected,
                "signal {signal_name}: expected {expected}, got {decoded}"
            );
        }
    }

    #[test]
    fn test_extract_64bit_signals() {
        // s64 (LE, 64-bit signed): -8613302515775888879
        let data = frame_data("(0.0) vcan0 002#11223344FF667788");
        let s64 = signal(&bus::WIDE_SIGNED, "s64");
        assert_eq!(s64.extract(&data), 0x887766FF44332211);
        assert_eq!(s64.decode(&data), -8613302515775888879.0);

        // s64big (BE, 64-bit signed): -9223372036854775808
        let data_big = frame_data("(0.0) vcan0 003#8000000000000000");
        let s64big = signal(&bus::WIDE_SIGNED_BIG, "s64big");
        assert_eq!(s64big.extract(&data_big), 0x8000000000000000);
        assert_eq!(s64big.decode(&data_big), -9223372036854775808.0);
    }

    #[test]
    fn test_sign_extend_edges() {
        assert_eq!(sign_extend(0b111, 3), -1);
        assert_eq!(sign_extend(0b011, 3), 3);
        assert_eq!(sign_extend(0b100, 3), -4);
        assert_eq!(sign_extend(1, 1), -1);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
        assert_eq!(sign_extend(0x7FFF_FFFF_FFFF_FFFF, 64), i64::MAX);
    }

    #[test]
    fn test_interpret_float_bits() {
        assert_eq!(interpret(0x3F80_0000, 32, ValueType::Float32), 1.0);
        assert_eq!(interpret(0xC000_0000_0000_0000, 64, ValueType::Float64), -2.0);
        // Signedness only applies to integer types
        assert_eq!(interpret(0xFF, 8, ValueType::Unsigned), 255.0);
        assert_eq!(interpret(0xFF, 8, ValueType::Signed), -1.0);
    }

    #[test]
    fn test_interpret_fixed_point() {
        let q4_4 = ValueType::FixedPoint { integer: 4, decimal: 4 };
        // 0b0101_1000: integer part 5, fraction 8/16
        assert_eq!(interpret(0x58, 8, q4_4), 5.5);
        assert_eq!(interpret(0xFF, 8, q4_4), 15.9375);
        assert_eq!(interpret(0x01, 8, q4_4), 0.0625);

        let q12_4 = ValueType::FixedPoint { integer: 12, decimal: 4 };
        assert_eq!(interpret(0x7DF4, 16, q12_4), 2015.25);
        // No fractional bits reads as a plain unsigned integer
        assert_eq!(interpret(0xFFFF, 16, ValueType::FixedPoint { integer: 16, decimal: 0 }), 65535.0);
    }

    #[test]
    fn test_decode_fixed_point_signal() {
        // 16 bit Q12.4, little endian from bit 0, factor 0.1
        let throttle = SignalLayout {
            name: "Throttle",
            unit: "%",
            topic: "",
            start_bit: 0,
            bit_length: 16,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::FixedPoint { integer: 12, decimal: 4 },
            scale: 0.1,
            offset: 0.0,
        };
        let data = frame_data("(0.0) vcan0 050#F47D");
        assert_eq!(throttle.extract(&data), 0x7DF4);
        assert!((throttle.decode(&data) - 201.525).abs() < 1e-9);
    }

    // ---------------------------------------------------------------
    // Pack tests
    // ---------------------------------------------------------------

    #[test]
    fn test_pack_motohawk_golden_bytes() {
        // Pack all three motohawk signals into a zeroed frame and verify
        // the resulting bytes match the expected encoding.
        //
        // Temperature: raw=3510 (0xDB6), 12-bit BE, start_bit=0
        //   byte 0 bit 0 = MSB(1)           → 0x01
        //   byte 1 bits 7..0 = 0xB6          → 0xB6
        //   byte 2 bits 7..5 = 0b110          → 0xC0
        //
        // AverageRadius: raw=18, 6-bit BE, start_bit=6
        //   byte 0 bits 6..1 = 18 = 0b010010 → 0x24
        //
        // Enable: raw=1, 1-bit BE, start_bit=7
        //   byte 0 bit 7 = 1                  → 0x80
        //
        // Combined byte 0 = 0x01 | 0x24 | 0x80 = 0xA5
        let mut data = [0u8; CAN_MAX_DATA_LEN];
        signal(&bus::EXAMPLE_MESSAGE, "Temperature").pack(&mut data, 0xDB6);
        signal(&bus::EXAMPLE_MESSAGE, "AverageRadius").pack(&mut data, 18);
        signal(&bus::EXAMPLE_MESSAGE, "Enable").pack(&mut data, 1);

        assert_eq!(data[0], 0xA5, "byte 0");
        assert_eq!(data[1], 0xB6, "byte 1");
        assert_eq!(data[2], 0xC0, "byte 2"); // only bits 5-7 used
        assert_eq!(data[3], 0x00, "byte 3");
    }

    #[test]
    fn test_pack_wide_signals_golden_bytes() {
        // s64 LE from bit 0 takes the bytes verbatim, low byte first
        let mut data = [0u8; CAN_MAX_DATA_LEN];
        signal(&bus::WIDE_SIGNED, "s64").pack(&mut data, 0x887766FF44332211);
        assert_eq!(data, [0x11, 0x22, 0x33, 0x44, 0xFF, 0x66, 0x77, 0x88]);

        // s64big from bit 7 takes them high byte first
        let mut data = [0u8; CAN_MAX_DATA_LEN];
        signal(&bus::WIDE_SIGNED_BIG, "s64big").pack(&mut data, 0x8000000000000001);
        assert_eq!(data, [0x80, 0, 0, 0, 0, 0, 0, 0x01]);
    }

    #[test]
    fn test_pack_clears_existing_bits() {
        // Start with all-0xFF frame, pack a 0 value, check bits are cleared.
        let enable = signal(&bus::EXAMPLE_MESSAGE, "Enable");
        let mut data = [0xFFu8; CAN_MAX_DATA_LEN];
        enable.pack(&mut data, 0);

        // Enable is bit 7 of byte 0. Packing 0 should clear it.
        assert_eq!(data[0], 0x7F); // bit 7 cleared, rest untouched
        assert_eq!(data[1], 0xFF); // other bytes untouched
    }

    #[test]
    fn test_pack_truncates_to_width() {
        // 0x1FF does not fit 6 bits; only the low 6 bits (0x3F) land.
        let radius = signal(&bus::EXAMPLE_MESSAGE, "AverageRadius");
        let mut data = [0u8; CAN_MAX_DATA_LEN];
        radius.pack(&mut data, 0x1FF);
        assert_eq!(radius.extract(&data), 0x3F);
        assert_eq!(data[0], 0x7E);
        assert_eq!(&data[1..], &[0u8; 7]);
    }

    #[test]
    fn test_pack_does_not_disturb_neighbours() {
        // Fill each signal of SignedSamples with ones, one at a time, and
        // check no other signal moves.
        let signals = bus::SIGNED_SAMPLES.signals;
        for target in signals {
            let mut data = [0u8; CAN_MAX_DATA_LEN];
            target.pack(&mut data, u64::MAX);
            assert_eq!(target.extract(&data), target.raw_mask());
            for other in signals.iter().filter(|s| s.name != target.name) {
                assert_eq!(
                    other.extract(&data),
                    0,
                    "packing {} leaked into {}",
                    target.name,
                    other.name
                );
            }
        }
    }

    // ---------------------------------------------------------------
    // Round-trip tests: extract → pack → extract
    // ---------------------------------------------------------------

    #[test]
    fn test_roundtrip_extract_pack_signed() {
        let frames_and_messages: &[(&str, &MessageLayout)] = &[
            ("(0.0) vcan0 00A#11223344FF667788", &bus::SIGNED_SAMPLES),
            ("(0.0) vcan0 002#11223344FF667788", &bus::WIDE_SIGNED),
            ("(0.0) vcan0 003#8000000000000000", &bus::WIDE_SIGNED_BIG),
            ("(0.0) vcan0 1F0#A5B6D90000000000", &bus::EXAMPLE_MESSAGE),
        ];

        for (line, message) in frames_and_messages {
            let data = frame_data(line);
            for signal in message.signals {
                let raw = signal.extract(&data);
                let mut packed = [0u8; CAN_MAX_DATA_LEN];
                signal.pack(&mut packed, raw);
                let raw2 = signal.extract(&packed);
                assert_eq!(
                    raw, raw2,
                    "extract-pack roundtrip failed for {}.{}: {} != {}",
                    message.name, signal.name, raw, raw2
                );
            }
        }
    }

    #[test]
    fn test_every_field_shape_roundtrips_in_8_bytes() {
        // Exhaustive over every (start, length, order) that fits 8 bytes.
        let pattern = 0xA5C3_0F96_5AE1_7B2Du64;
        for byte_order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            for start_bit in 0u8..64 {
                for bit_length in 1u8..=64 {
                    if last_byte(start_bit, bit_length, byte_order) >= CAN_MAX_DATA_LEN {
                        continue;
                    }
                    let mask = if bit_length == 64 { u64::MAX } else { (1u64 << bit_length) - 1 };
                    let mut data = [0x5Au8; CAN_MAX_DATA_LEN];
                    let before = data;
                    pack(&mut data, start_bit, bit_length, byte_order, pattern);
                    assert_eq!(
                        extract(&data, start_bit, bit_length, byte_order),
                        pattern & mask,
                        "{byte_order:?} start={start_bit} len={bit_length}"
                    );
                    // Bits outside the field are unchanged
                    let covered = occupancy(start_bit, bit_length, byte_order);
                    let outside = !covered;
                    assert_eq!(
                        u64::from_le_bytes(data) & outside,
                        u64::from_le_bytes(before) & outside
                    );
                    assert_eq!(covered.count_ones(), bit_length as u32);
                }
            }
        }
    }

    #[test]
    fn test_last_byte_matches_span_walk() {
        for byte_order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            for start_bit in 0u8..64 {
                for bit_length in 1u8..=64 {
                    let walked = BitSpans::new(start_bit, bit_length, byte_order)
                        .last()
                        .map(|span| span.byte_index)
                        .unwrap();
                    assert_eq!(last_byte(start_bit, bit_length, byte_order), walked);
                }
            }
        }
    }

    #[test]
    fn test_fits_in() {
        let radius = signal(&bus::EXAMPLE_MESSAGE, "AverageRadius");
        assert!(radius.fits_in(1));
        assert!(!radius.fits_in(0));

        let temperature = signal(&bus::EXAMPLE_MESSAGE, "Temperature");
        assert!(temperature.fits_in(3));
        assert!(!temperature.fits_in(2));
        assert!(!temperature.fits_in(9));
    }
}
