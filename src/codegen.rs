/*!
 * Renders compiled schemas as Rust layout tables and typed encode structs
 */

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{self, Write};

use heck::{ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};

use crate::schema::{MessageSchema, Result, SchemaError, SignalSchema};
use crate::signal_layout::ValueType;

/// Types the generated module imports.
const RESERVED_TYPES: &[&str] = &[
    "Registry",
    "MessageKind",
    "MessageLayout",
    "ByteOrder",
    "SignalLayout",
    "ValueType",
];
/// Statics and consts the generated module defines besides the layouts.
const RESERVED_VALUES: &[&str] = &["ALL_MESSAGES", "MESSAGES", "REGISTRY"];
const MODULE_OWNER: &str = "the generated module";

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn", "for",
    "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return",
    "self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use", "where",
    "while", "async", "await", "dyn",
];

fn identifier(cased: String) -> String {
    if cased.starts_with(|c: char| c.is_ascii_digit()) {
        format!("x{cased}")
    } else if RUST_KEYWORDS.contains(&cased.as_str()) {
        format!("{cased}_")
    } else {
        cased
    }
}

pub fn const_name(message: &MessageSchema) -> String {
    identifier(message.name.to_shouty_snake_case())
}

pub fn struct_name(message: &MessageSchema) -> String {
    identifier(message.name.to_upper_camel_case())
}

pub fn field_name(signal: &SignalSchema) -> String {
    identifier(signal.name.to_snake_case())
}

/// Smallest integer type holding the raw value of a signal.
pub fn field_type(signal: &SignalSchema) -> &'static str {
    let width = signal.bit_length;
    match signal.value_type {
        ValueType::Float32 => "u32",
        ValueType::Float64 => "u64",
        ValueType::Signed => match width {
            0..=8 => "i8",
            9..=16 => "i16",
            17..=32 => "i32",
            _ => "i64",
        },
        ValueType::Unsigned | ValueType::FixedPoint { .. } => match width {
            0..=8 => "u8",
            9..=16 => "u16",
            17..=32 => "u32",
            _ => "u64",
        },
    }
}

fn claim(taken: &mut HashMap<String, String>, identifier: String, owner: String) -> Result<()> {
    match taken.entry(identifier) {
        Entry::Occupied(entry) => Err(SchemaError::NameClash {
            identifier: entry.key().clone(),
            first: entry.get().clone(),
            second: owner,
        }),
        Entry::Vacant(entry) => {
            entry.insert(owner);
            Ok(())
        }
    }
}

fn reserved(names: &[&str]) -> HashMap<String, String> {
    names
        .iter()
        .map(|name| ((*name).to_owned(), MODULE_OWNER.to_owned()))
        .collect()
}

/// Check that every generated struct, layout constant and field gets a name
/// of its own.
pub fn check_identifiers(messages: &[MessageSchema]) -> Result<()> {
    let mut types = reserved(RESERVED_TYPES);
    let mut values = reserved(RESERVED_VALUES);
    for message in messages {
        claim(&mut types, struct_name(message), message.name.clone())?;
        claim(&mut values, const_name(message), message.name.clone())?;
        let mut fields = HashMap::new();
        for signal in &message.signals {
            claim(
                &mut fields,
                field_name(signal),
                format!("{}.{}", message.name, signal.name),
            )?;
        }
    }
    Ok(())
}

fn write_layout(out: &mut String, message: &MessageSchema) -> fmt::Result {
    writeln!(out, "pub const {}: MessageLayout = MessageLayout {{", const_name(message))?;
    writeln!(out, "    id: {:#X},", message.id)?;
    writeln!(out, "    name: {:?},", message.name)?;
    writeln!(out, "    byte_length: {},", message.dlc)?;
    writeln!(out, "    signals: &[")?;
    for signal in &message.signals {
        writeln!(out, "        SignalLayout {{")?;
        writeln!(out, "            name: {:?},", signal.name)?;
        writeln!(out, "            unit: {:?},", signal.unit)?;
        writeln!(out, "            topic: {:?},", signal.topic)?;
        writeln!(out, "            start_bit: {},", signal.start_bit)?;
        writeln!(out, "            bit_length: {},", signal.bit_length)?;
        writeln!(out, "            byte_order: ByteOrder::{:?},", signal.byte_order)?;
        writeln!(out, "            value_type: ValueType::{:?},", signal.value_type)?;
        writeln!(out, "            scale: {:?},", signal.factor)?;
        writeln!(out, "            offset: {:?},", signal.offset)?;
        writeln!(out, "        }},")?;
    }
    writeln!(out, "    ],")?;
    writeln!(out, "}};")?;
    writeln!(out, "const _: () = assert!({}.is_well_formed());", const_name(message))?;
    writeln!(out)
}

fn write_message_kind(out: &mut String, message: &MessageSchema) -> fmt::Result {
    let name = struct_name(message);
    writeln!(out, "#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]")?;
    writeln!(out, "pub struct {name} {{")?;
    for signal in &message.signals {
        writeln!(out, "    pub {}: {},", field_name(signal), field_type(signal))?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl MessageKind for {name} {{")?;
    writeln!(out, "    const LAYOUT: &'static MessageLayout = &{};", const_name(message))?;
    writeln!(out, "    type Raw = [u64; {}];", message.signals.len())?;
    writeln!(out)?;
    writeln!(out, "    fn raw_values(&self) -> Self::Raw {{")?;
    let values: Vec<String> = message
        .signals
        .iter()
        .map(|signal| format!("self.{} as u64", field_name(signal)))
        .collect();
    writeln!(out, "        [{}]", values.join(", "))?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_module(out: &mut String, messages: &[MessageSchema]) -> fmt::Result {
    writeln!(out, "// Generated by canpack. Do not edit.")?;
    writeln!(out)?;
    writeln!(out, "use canpack::can_decoder::Registry;")?;
    writeln!(out, "use canpack::message_layout::{{MessageKind, MessageLayout}};")?;
    writeln!(out, "use canpack::signal_layout::{{ByteOrder, SignalLayout, ValueType}};")?;
    writeln!(out)?;
    for message in messages {
        write_layout(out, message)?;
    }
    writeln!(out, "const ALL_MESSAGES: &[&MessageLayout] = &[")?;
    for message in messages {
        writeln!(out, "    &{},", const_name(message))?;
    }
    writeln!(out, "];")?;
    writeln!(out)?;
    writeln!(out, "pub static MESSAGES: &[&MessageLayout] = ALL_MESSAGES;")?;
    writeln!(out)?;
    writeln!(out, "pub static REGISTRY: Registry = Registry::new(ALL_MESSAGES);")?;
    writeln!(out)?;
    for message in messages {
        write_message_kind(out, message)?;
    }
    Ok(())
}

/// Render a validated schema as a Rust module built on this crate's types.
pub fn render(messages: &[MessageSchema]) -> Result<String> {
    check_identifiers(messages)?;
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_module(&mut out, messages);
    Ok(out)
}
