/*!
 * Decode and encode CAN frames against static message layouts.
 *
 * ```
 * use canpack::bus::{EngineStatus, REGISTRY};
 * use canpack::message_layout::MessageKind;
 *
 * let frame = EngineStatus { engine_speed: 0x42587df4, battery_temperature: 206 }.encode();
 * let signals = REGISTRY.decode(&frame).unwrap();
 * assert_eq!(signals[1].value, 206.3125);
 * ```
 */

pub mod bus;
pub mod can_decoder;
pub mod can_encoder;
pub mod candump;
pub mod codegen;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod frame;
pub mod message_layout;
pub mod result_buffer;
pub mod scaling;
pub mod schema;
pub mod signal_layout;

pub use can_decoder::Registry;
pub use error::{Error, Result};
pub use frame::CanFrame;
pub use message_layout::{DecodedSignal, MessageKind, MessageLayout};
pub use signal_layout::{ByteOrder, SignalLayout, ValueType};
