/*!
 * Layout tables of the built-in powertrain bus.
 *
 * Mirrors `schema/powertrain.dbc` and `schema/powertrain_legacy.dbc`. The
 * schema tests compile both files and compare the result with these tables,
 * so a change to either side must be made to the other.
 */

use crate::can_decoder::Registry;
use crate::message_layout::{MessageKind, MessageLayout};
use crate::signal_layout::{ByteOrder, SignalLayout, ValueType};

pub const ENGINE_STATUS: MessageLayout = MessageLayout {
    id: 0x7B,
    name: "EngineStatus",
    byte_length: 6,
    signals: &[
        SignalLayout {
            name: "EngineSpeed",
            unit: "RPM",
            topic: "Engine/Metrics/Speed",
            start_bit: 7,
            bit_length: 32,
            byte_order: ByteOrder::BigEndian,
            value_type: ValueType::Float32,
            scale: 0.1,
            offset: 0.0,
        },
        SignalLayout {
            name: "BatteryTemperature",
            unit: "ºC",
            topic: "Battery/Metrics/Temperature",
            start_bit: 39,
            bit_length: 12,
            byte_order: ByteOrder::BigEndian,
            value_type: ValueType::Unsigned,
            scale: 1.0,
            offset: 0.3125,
        },
    ],
};

/// Older 8 byte revision of `EngineStatus`, still sent by legacy ECUs on the
/// same identifier.
pub const ENGINE_STATUS_EXTENDED: MessageLayout = MessageLayout {
    id: 0x7B,
    name: "EngineStatusExtended",
    byte_length: 8,
    signals: &[
        SignalLayout {
            name: "EngineSpeed",
            unit: "RPM",
            topic: "Engine/Metrics/Speed",
            start_bit: 7,
            bit_length: 32,
            byte_order: ByteOrder::BigEndian,
            value_type: ValueType::Unsigned,
            scale: 0.1,
            offset: 0.0,
        },
        SignalLayout {
            name: "BatteryTemperature",
            unit: "ºC",
            topic: "Battery/Metrics/Temperature",
            start_bit: 39,
            bit_length: 12,
            byte_order: ByteOrder::BigEndian,
            value_type: ValueType::Unsigned,
            scale: 3.0,
            offset: -12.0,
        },
    ],
};

pub const EXAMPLE_MESSAGE: MessageLayout = MessageLayout {
    id: 0x1F0,
    name: "ExampleMessage",
    byte_length: 8,
    signals: &[
        SignalLayout {
            name: "Enable",
            unit: "-",
            topic: "",
            start_bit: 7,
            bit_length: 1,
            byte_order: ByteOrder::BigEndian,
            value_type: ValueType::Unsigned,
            scale: 1.0,
            offset: 0.0,
        },
        SignalLayout {
            name: "AverageRadius",
            unit: "m",
            topic: "",
            start_bit: 6,
            bit_length: 6,
            byte_order: ByteOrder::BigEndian,
            value_type: ValueType::Unsigned,
            scale: 0.1,
            offset: 0.0,
        },
        SignalLayout {
            name: "Temperature",
            unit: "degK",
            topic: "",
            start_bit: 0,
            bit_length: 12,
            byte_order: ByteOrder::BigEndian,
            value_type: ValueType::Signed,
            scale: 0.01,
            offset: 250.0,
        },
    ],
};

const fn signed_sample(
    name: &'static str,
    start_bit: u8,
    bit_length: u8,
    byte_order: ByteOrder,
) -> SignalLayout {
    SignalLayout {
        name,
        unit: "",
        topic: "",
        start_bit,
        bit_length,
        byte_order,
        value_type: ValueType::Signed,
        scale: 1.0,
        offset: 0.0,
    }
}

pub const SIGNED_SAMPLES: MessageLayout = MessageLayout {
    id: 0x00A,
    name: "SignedSamples",
    byte_length: 8,
    signals: &[
        signed_sample("s3big", 39, 3, ByteOrder::BigEndian),
        signed_sample("s3", 34, 3, ByteOrder::LittleEndian),
        signed_sample("s10big", 40, 10, ByteOrder::BigEndian),
        signed_sample("s8big", 0, 8, ByteOrder::BigEndian),
        signed_sample("s7big", 62, 7, ByteOrder::BigEndian),
        signed_sample("s9", 17, 9, ByteOrder::LittleEndian),
        signed_sample("s8", 26, 8, ByteOrder::LittleEndian),
        signed_sample("s7", 1, 7, ByteOrder::LittleEndian),
    ],
};

pub const WIDE_SIGNED: MessageLayout = MessageLayout {
    id: 0x002,
    name: "WideSigned",
    byte_length: 8,
    signals: &[signed_sample("s64", 0, 64, ByteOrder::LittleEndian)],
};

pub const WIDE_SIGNED_BIG: MessageLayout = MessageLayout {
    id: 0x003,
    name: "WideSignedBig",
    byte_length: 8,
    signals: &[signed_sample("s64big", 7, 64, ByteOrder::BigEndian)],
};

const _: () = assert!(ENGINE_STATUS.is_well_formed());
const _: () = assert!(ENGINE_STATUS_EXTENDED.is_well_formed());
const _: () = assert!(EXAMPLE_MESSAGE.is_well_formed());
const _: () = assert!(SIGNED_SAMPLES.is_well_formed());
const _: () = assert!(WIDE_SIGNED.is_well_formed());
const _: () = assert!(WIDE_SIGNED_BIG.is_well_formed());

const ALL_MESSAGES: &[&MessageLayout] = &[
    &ENGINE_STATUS,
    &ENGINE_STATUS_EXTENDED,
    &EXAMPLE_MESSAGE,
    &SIGNED_SAMPLES,
    &WIDE_SIGNED,
    &WIDE_SIGNED_BIG,
];

/// Every message of the bus, in schema order.
pub static MESSAGES: &[&MessageLayout] = ALL_MESSAGES;

pub static REGISTRY: Registry = Registry::new(ALL_MESSAGES);

// Typed encode surface. Float signals carry their IEEE bit pattern.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub engine_speed: u32,
    pub battery_temperature: u16,
}

impl MessageKind for EngineStatus {
    const LAYOUT: &'static MessageLayout = &ENGINE_STATUS;
    type Raw = [u64; 2];

    fn raw_values(&self) -> Self::Raw {
        [self.engine_speed as u64, self.battery_temperature as u64]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatusExtended {
    pub engine_speed: u32,
    pub battery_temperature: u16,
}

impl MessageKind for EngineStatusExtended {
    const LAYOUT: &'static MessageLayout = &ENGINE_STATUS_EXTENDED;
    type Raw = [u64; 2];

    fn raw_values(&self) -> Self::Raw {
        [self.engine_speed as u64, self.battery_temperature as u64]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExampleMessage {
    pub enable: u8,
    pub average_radius: u8,
    pub temperature: i16,
}

impl MessageKind for ExampleMessage {
    const LAYOUT: &'static MessageLayout = &EXAMPLE_MESSAGE;
    type Raw = [u64; 3];

    fn raw_values(&self) -> Self::Raw {
        [
            self.enable as u64,
            self.average_radius as u64,
            self.temperature as u64,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignedSamples {
    pub s3big: i8,
    pub s3: i8,
    pub s10big: i16,
    pub s8big: i8,
    pub s7big: i8,
    pub s9: i16,
    pub s8: i8,
    pub s7: i8,
}

impl MessageKind for SignedSamples {
    const LAYOUT: &'static MessageLayout = &SIGNED_SAMPLES;
    type Raw = [u64; 8];

    fn raw_values(&self) -> Self::Raw {
        [
            self.s3big as u64,
            self.s3 as u64,
            self.s10big as u64,
            self.s8big as u64,
            self.s7big as u64,
            self.s9 as u64,
            self.s8 as u64,
            self.s7 as u64,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WideSigned {
    pub s64: i64,
}

impl MessageKind for WideSigned {
    const LAYOUT: &'static MessageLayout = &WIDE_SIGNED;
    type Raw = [u64; 1];

    fn raw_values(&self) -> Self::Raw {
        [self.s64 as u64]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WideSignedBig {
    pub s64big: i64,
}

impl MessageKind for WideSignedBig {
    const LAYOUT: &'static MessageLayout = &WIDE_SIGNED_BIG;
    type Raw = [u64; 1];

    fn raw_values(&self) -> Self::Raw {
        [self.s64big as u64]
    }
}
