/*!
 * C interface to the built-in bus
 *
 * Decoding keeps the single nullable-destination entry point C callers
 * expect: a null `dest` makes the library allocate the result, which must
 * then be released with `canpack_free_decoding_result`. Strings in decoded
 * signals point into static tables and are not NUL terminated.
 */

use std::ptr;

use crate::bus::{self, REGISTRY};
use crate::error::Error;
use crate::frame::CanFrame;
use crate::message_layout::{DecodedSignal, MessageKind};
use crate::result_buffer;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanpackStatus {
    Ok = 0,
    UnknownMessage = 1,
    LengthMismatch = 2,
    NullArgument = 3,
    BufferTooSmall = 4,
}

impl From<Error> for CanpackStatus {
    fn from(error: Error) -> Self {
        match error {
            Error::UnknownMessage { .. } => CanpackStatus::UnknownMessage,
            Error::LengthMismatch { .. } => CanpackStatus::LengthMismatch,
            Error::NullArgument => CanpackStatus::NullArgument,
            Error::BufferTooSmall { .. } => CanpackStatus::BufferTooSmall,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CanpackSignal {
    pub name: *const u8,
    pub name_len: usize,
    pub unit: *const u8,
    pub unit_len: usize,
    pub topic: *const u8,
    pub topic_len: usize,
    pub value: f64,
}

impl From<DecodedSignal> for CanpackSignal {
    fn from(signal: DecodedSignal) -> Self {
        Self {
            name: signal.name.as_ptr(),
            name_len: signal.name.len(),
            unit: signal.unit.as_ptr(),
            unit_len: signal.unit.len(),
            topic: signal.topic.as_ptr(),
            topic_len: signal.topic.len(),
            value: signal.value,
        }
    }
}

/// `signals` is owned by the library when `owned` is set, otherwise it is the
/// caller's `dest`.
#[repr(C)]
#[derive(Debug)]
pub struct CanpackDecodingResult {
    pub signals: *mut CanpackSignal,
    pub count: usize,
    pub owned: bool,
}

/// Decode `frame` against the built-in bus.
///
/// # Safety
/// `frame` and `result` must be null or valid for reads/writes. A non-null
/// `dest` must be valid for `capacity` writes. On error `result` and `dest`
/// are not written.
#[no_mangle]
pub unsafe extern "C" fn canpack_decode_frame(
    frame: *const CanFrame,
    dest: *mut CanpackSignal,
    capacity: usize,
    result: *mut CanpackDecodingResult,
) -> CanpackStatus {
    let (Some(frame), Some(result)) = (unsafe { frame.as_ref() }, unsafe { result.as_mut() }) else {
        return CanpackStatus::NullArgument;
    };
    let layout = match REGISTRY.lookup(frame.id, frame.dlc) {
        Ok(layout) => layout,
        Err(error) => return error.into(),
    };

    if dest.is_null() {
        let signals: Box<[CanpackSignal]> = result_buffer::allocate(layout, frame)
            .into_iter()
            .map(CanpackSignal::from)
            .collect();
        let count = signals.len();
        *result = CanpackDecodingResult {
            signals: Box::into_raw(signals).cast::<CanpackSignal>(),
            count,
            owned: true,
        };
        return CanpackStatus::Ok;
    }

    let out = unsafe { std::slice::from_raw_parts_mut(dest, capacity) };
    let count = match result_buffer::write_in_place(layout, frame, out) {
        Ok(count) => count,
        Err(error) => return error.into(),
    };
    *result = CanpackDecodingResult {
        signals: dest,
        count,
        owned: false,
    };
    CanpackStatus::Ok
}

/// Release a result produced with a null `dest`. Borrowed results and null
/// pointers are ignored.
///
/// # Safety
/// `result` must be null or point to a result filled by
/// `canpack_decode_frame` that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn canpack_free_decoding_result(result: *mut CanpackDecodingResult) {
    let Some(result) = (unsafe { result.as_mut() }) else {
        return;
    };
    if result.owned && !result.signals.is_null() {
        let slice = ptr::slice_from_raw_parts_mut(result.signals, result.count);
        drop(unsafe { Box::from_raw(slice) });
    }
    result.signals = ptr::null_mut();
    result.count = 0;
    result.owned = false;
}

macro_rules! ffi_encoder {
    ($encode:ident, $count:ident, $kind:ident { $($field:ident: $ty:ty),+ $(,)? }) => {
        #[no_mangle]
        pub static $count: usize = <bus::$kind as MessageKind>::SIGNAL_COUNT;

        /// Encode raw values into `frame`, setting id and dlc.
        ///
        /// # Safety
        /// `frame` must be null or valid for reads and writes.
        #[no_mangle]
        pub unsafe extern "C" fn $encode($($field: $ty,)+ frame: *mut CanFrame) -> CanpackStatus {
            let Some(frame) = (unsafe { frame.as_mut() }) else {
                return CanpackStatus::NullArgument;
            };
            bus::$kind { $($field),+ }.encode_into(frame);
            CanpackStatus::Ok
        }
    };
}

ffi_encoder!(canpack_encode_engine_status, CANPACK_ENGINE_STATUS_SIGNAL_COUNT, EngineStatus {
    engine_speed: u32,
    battery_temperature: u16,
});

ffi_encoder!(canpack_encode_engine_status_extended, CANPACK_ENGINE_STATUS_EXTENDED_SIGNAL_COUNT, EngineStatusExtended {
    engine_speed: u32,
    battery_temperature: u16,
});

ffi_encoder!(canpack_encode_example_message, CANPACK_EXAMPLE_MESSAGE_SIGNAL_COUNT, ExampleMessage {
    enable: u8,
    average_radius: u8,
    temperature: i16,
});

ffi_encoder!(canpack_encode_signed_samples, CANPACK_SIGNED_SAMPLES_SIGNAL_COUNT, SignedSamples {
    s3big: i8,
    s3: i8,
    s10big: i16,
    s8big: i8,
    s7big: i8,
    s9: i16,
    s8: i8,
    s7: i8,
});

ffi_encoder!(canpack_encode_wide_signed, CANPACK_WIDE_SIGNED_SIGNAL_COUNT, WideSigned { s64: i64 });

ffi_encoder!(canpack_encode_wide_signed_big, CANPACK_WIDE_SIGNED_BIG_SIGNAL_COUNT, WideSignedBig { s64big: i64 });
