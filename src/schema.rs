/*!
 * Compiles DBC bus descriptions into checked message/signal schemas
 *
 * Besides standard DBC the compiler accepts two extensions:
 * - topic lines, `TP_ <SignalName> <Topic>`, which attach a routing topic to
 *   every signal of that name in the file;
 * - a fixed point suffix on the bit info of a signal,
 *   `SG_ Speed : 0|16@1+(12,4) ...`, giving its integer and decimal figures.
 */

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use can_dbc::{MessageId, MultiplexIndicator, SignalExtendedValueType, Transmitter, DBC};
use thiserror::Error;
use tracing::{info, warn};

use crate::frame::CAN_MAX_DATA_LEN;
use crate::signal_layout::{last_byte, occupancy, ByteOrder, ValueType};

const TOPIC_PREFIX: &str = "TP_";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("DBC parse error at line {line}: {text}")]
    Parse { line: usize, text: String },

    #[error("line {line}: signal topic has wrong structure, expected `TP_ <SignalName> <Topic>`: {text}")]
    InvalidTopic { line: usize, text: String },

    #[error("line {line}: invalid fixed point figures, expected `(<integer>,<decimal>)`: {text}")]
    InvalidFixedPoint { line: usize, text: String },

    #[error("message {message}: length {dlc} exceeds 8 bytes")]
    DlcTooLarge { message: String, dlc: u64 },

    #[error("{message}.{signal}: start bit {start_bit} is outside 0..=63")]
    StartBitOutOfRange {
        message: String,
        signal: String,
        start_bit: u64,
    },

    #[error("{message}.{signal}: length {length} is outside 1..=64")]
    InvalidLength {
        message: String,
        signal: String,
        length: u64,
    },

    #[error("{message}.{signal}: bits reach past the {dlc} byte frame")]
    SignalOutsideFrame {
        message: String,
        signal: String,
        dlc: u8,
    },

    #[error("{message}.{signal}: factor is zero")]
    ZeroFactor { message: String, signal: String },

    #[error("{message}.{signal}: {length} bit signal cannot hold {value_type:?}")]
    FloatWidth {
        message: String,
        signal: String,
        length: u8,
        value_type: ValueType,
    },

    #[error("{message}.{signal}: {integer} integer and {decimal} decimal figures do not fill {length} bits")]
    FixedPointWidth {
        message: String,
        signal: String,
        integer: u8,
        decimal: u8,
        length: u8,
    },

    #[error("{message}: signals {first} and {second} share bits")]
    Overlap {
        message: String,
        first: String,
        second: String,
    },

    #[error("message id {id:#x} with length {dlc} is defined twice")]
    DuplicateMessage { id: u32, dlc: u8 },

    #[error("generated name {identifier} is used by both {first} and {second}")]
    NameClash {
        identifier: String,
        first: String,
        second: String,
    },
}

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSchema {
    pub name: String,
    pub start_bit: u8,
    pub bit_length: u8,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    pub factor: f64,
    pub offset: f64,
    pub min: f64,
    pub max: f64,
    pub unit: String,
    pub receivers: Vec<String>,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    pub id: u32,
    pub name: String,
    pub dlc: u8,
    pub transmitter: Option<String>,
    pub signals: Vec<SignalSchema>,
}

/// Remove topic lines from DBC text. Returns the remaining text and the
/// topic of each named signal. Removed lines are left blank so the DBC
/// parser sees the original line numbers.
pub fn split_topics(text: &str) -> Result<(String, HashMap<String, String>)> {
    let mut topics = HashMap::new();
    let mut dbc = String::with_capacity(text.len());
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with(TOPIC_PREFIX) {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            match parts.as_slice() {
                [TOPIC_PREFIX, signal, topic] => {
                    topics.insert((*signal).to_owned(), (*topic).to_owned());
                }
                _ => {
                    return Err(SchemaError::InvalidTopic {
                        line: index + 1,
                        text: trimmed.to_owned(),
                    })
                }
            }
        } else {
            dbc.push_str(line);
        }
        dbc.push('\n');
    }
    Ok((dbc, topics))
}

/// Integer and decimal figures of fixed point signals, keyed by message and
/// signal name.
pub type FixedPointFigures = HashMap<(String, String), (u8, u8)>;

/// Remove fixed point suffixes from signal lines. Returns the remaining text
/// and the figures of each fixed point signal.
pub fn split_fixed_point(text: &str) -> Result<(String, FixedPointFigures)> {
    let mut figures = HashMap::new();
    let mut dbc = String::with_capacity(text.len());
    let mut message = "";
    for (index, line) in text.lines().enumerate() {
        let invalid = || SchemaError::InvalidFixedPoint {
            line: index + 1,
            text: line.trim().to_owned(),
        };
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("BO_") => {
                message = tokens.nth(1).unwrap_or_default().trim_end_matches(':');
            }
            Some("SG_") => {
                // `@` is followed by the byte order digit and the sign
                let suffix = line
                    .find('@')
                    .and_then(|at| Some((at + 3, line.get(at + 3..)?)))
                    .filter(|(_, rest)| rest.starts_with('('));
                if let Some((cut, rest)) = suffix {
                    let close = rest.find(')').ok_or_else(invalid)?;
                    let (integer, decimal) = rest[1..close].split_once(',').ok_or_else(invalid)?;
                    let integer: u8 = integer.trim().parse().map_err(|_| invalid())?;
                    let decimal: u8 = decimal.trim().parse().map_err(|_| invalid())?;
                    let signal = tokens.next().ok_or_else(invalid)?.trim_end_matches(':');
                    if integer > 0 || decimal > 0 {
                        figures.insert((message.to_owned(), signal.to_owned()), (integer, decimal));
                    }
                    dbc.push_str(&line[..cut]);
                    dbc.push(' ');
                    dbc.push_str(rest[close + 1..].trim_start());
                    dbc.push('\n');
                    continue;
                }
            }
            _ => {}
        }
        dbc.push_str(line);
        dbc.push('\n');
    }
    Ok((dbc, figures))
}

/// Locate where the DBC parser gave up.
fn parse_error(text: &str, error: can_dbc::Error<'_>) -> SchemaError {
    let remaining = match error {
        can_dbc::Error::Incomplete(_, remaining) => remaining,
        can_dbc::Error::Nom(nom::Err::Error(e) | nom::Err::Failure(e)) => e.input,
        can_dbc::Error::Nom(nom::Err::Incomplete(_)) | can_dbc::Error::MultipleMultiplexors => "",
    };
    let rest = remaining.trim_start();
    let offset = text.len().saturating_sub(rest.len());
    let line = text[..offset].matches('\n').count() + 1;
    let text = match rest.lines().next() {
        Some(first) => first.trim().to_owned(),
        None => "unexpected end of input".to_owned(),
    };
    SchemaError::Parse { line, text }
}

fn narrow<T: TryFrom<u64>>(value: u64, error: impl FnOnce() -> SchemaError) -> Result<T> {
    T::try_from(value).map_err(|_| error())
}

/// Compile the text of one DBC file. The result is not validated.
pub fn compile_dbc(text: &str) -> Result<Vec<MessageSchema>> {
    let (without_topics, topics) = split_topics(text)?;
    let (dbc_text, fixed_point) = split_fixed_point(&without_topics)?;
    let dbc = DBC::try_from(dbc_text.as_str()).map_err(|e| parse_error(&dbc_text, e))?;

    let mut messages = Vec::with_capacity(dbc.messages().len());
    for message in dbc.messages() {
        let name = message.message_name().clone();
        let id = match message.message_id() {
            MessageId::Standard(id) => *id as u32,
            MessageId::Extended(id) => *id,
        };
        let dlc = narrow(*message.message_size(), || SchemaError::DlcTooLarge {
            message: name.clone(),
            dlc: *message.message_size(),
        })?;
        let transmitter = match message.transmitter() {
            Transmitter::NodeName(node) => Some(node.clone()),
            Transmitter::VectorXXX => None,
        };

        let mut signals = Vec::with_capacity(message.signals().len());
        for signal in message.signals() {
            let signal_name = signal.name();
            if !matches!(signal.multiplexer_indicator(), MultiplexIndicator::Plain) {
                warn!(
                    message = %name,
                    signal = %signal_name,
                    "multiplexing is not supported, signal is treated as plain"
                );
            }
            let start_bit = narrow(*signal.start_bit(), || SchemaError::StartBitOutOfRange {
                message: name.clone(),
                signal: signal_name.clone(),
                start_bit: *signal.start_bit(),
            })?;
            let bit_length = narrow(*signal.signal_size(), || SchemaError::InvalidLength {
                message: name.clone(),
                signal: signal_name.clone(),
                length: *signal.signal_size(),
            })?;
            let byte_order = match signal.byte_order() {
                can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
                can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
            };
            let extended_type =
                dbc.extended_value_type_for_signal(message.message_id().clone(), signal_name);
            let figures = fixed_point.get(&(name.clone(), signal_name.clone()));
            let value_type = match (figures, extended_type) {
                (Some(&(integer, decimal)), _) => ValueType::FixedPoint { integer, decimal },
                (None, Some(SignalExtendedValueType::IEEEfloat32Bit)) => ValueType::Float32,
                (None, Some(SignalExtendedValueType::IEEEdouble64bit)) => ValueType::Float64,
                (None, Some(SignalExtendedValueType::SignedOrUnsignedInteger) | None) => {
                    match signal.value_type() {
                        can_dbc::ValueType::Signed => ValueType::Signed,
                        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
                    }
                }
            };
            signals.push(SignalSchema {
                name: signal_name.clone(),
                start_bit,
                bit_length,
                byte_order,
                value_type,
                factor: *signal.factor(),
                offset: *signal.offset(),
                min: *signal.min(),
                max: *signal.max(),
                unit: signal.unit().clone(),
                receivers: signal.receivers().clone(),
                topic: topics.get(signal_name).cloned().unwrap_or_default(),
            });
        }

        info!(dlc, signals = signals.len(), "compiled message {name} ({id:#X})");
        messages.push(MessageSchema {
            id,
            name,
            dlc,
            transmitter,
            signals,
        });
    }
    Ok(messages)
}

/// Compile one DBC file from disk. The result is not validated.
pub fn load_dbc(path: &Path) -> Result<Vec<MessageSchema>> {
    let text = fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_owned(),
        source,
    })?;
    compile_dbc(&text)
}

/// Compile and merge several DBC files into one validated schema.
pub fn compile_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<MessageSchema>> {
    let mut messages = Vec::new();
    for path in paths {
        messages.extend(load_dbc(path.as_ref())?);
    }
    validate(&messages)?;
    Ok(messages)
}

fn check_signal(message: &MessageSchema, signal: &SignalSchema) -> Result<()> {
    let context = || (message.name.clone(), signal.name.clone());
    if signal.start_bit > 63 {
        let (message, signal_name) = context();
        return Err(SchemaError::StartBitOutOfRange {
            message,
            signal: signal_name,
            start_bit: signal.start_bit as u64,
        });
    }
    if signal.bit_length == 0 || signal.bit_length > 64 {
        let (message, signal_name) = context();
        return Err(SchemaError::InvalidLength {
            message,
            signal: signal_name,
            length: signal.bit_length as u64,
        });
    }
    if last_byte(signal.start_bit, signal.bit_length, signal.byte_order) >= message.dlc as usize {
        let (message_name, signal_name) = context();
        return Err(SchemaError::SignalOutsideFrame {
            message: message_name,
            signal: signal_name,
            dlc: message.dlc,
        });
    }
    if signal.factor == 0.0 {
        let (message, signal_name) = context();
        return Err(SchemaError::ZeroFactor {
            message,
            signal: signal_name,
        });
    }
    let float_width = match signal.value_type {
        ValueType::Float32 => Some(32),
        ValueType::Float64 => Some(64),
        ValueType::Unsigned | ValueType::Signed | ValueType::FixedPoint { .. } => None,
    };
    if float_width.is_some_and(|width| width != signal.bit_length) {
        let (message, signal_name) = context();
        return Err(SchemaError::FloatWidth {
            message,
            signal: signal_name,
            length: signal.bit_length,
            value_type: signal.value_type,
        });
    }
    if let ValueType::FixedPoint { integer, decimal } = signal.value_type {
        if integer as u16 + decimal as u16 != signal.bit_length as u16 {
            let (message, signal_name) = context();
            return Err(SchemaError::FixedPointWidth {
                message,
                signal: signal_name,
                integer,
                decimal,
                length: signal.bit_length,
            });
        }
    }
    Ok(())
}

/// Check that every message can be handed to the codec as is.
pub fn validate(messages: &[MessageSchema]) -> Result<()> {
    let mut seen_keys = HashSet::new();
    for message in messages {
        if message.dlc as usize > CAN_MAX_DATA_LEN {
            return Err(SchemaError::DlcTooLarge {
                message: message.name.clone(),
                dlc: message.dlc as u64,
            });
        }
        if !seen_keys.insert((message.id, message.dlc)) {
            return Err(SchemaError::DuplicateMessage {
                id: message.id,
                dlc: message.dlc,
            });
        }

        let mut owners: Vec<(u64, &str)> = Vec::with_capacity(message.signals.len());
        for signal in &message.signals {
            check_signal(message, signal)?;
            let bits = occupancy(signal.start_bit, signal.bit_length, signal.byte_order);
            if let Some((_, first)) = owners.iter().find(|(owned, _)| owned & bits != 0) {
                return Err(SchemaError::Overlap {
                    message: message.name.clone(),
                    first: (*first).to_owned(),
                    second: signal.name.clone(),
                });
            }
            owners.push((bits, &signal.name));
        }
    }
    Ok(())
}
