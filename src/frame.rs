/*!
 * Classic CAN frame as handed to and produced by the codec
 */

/// Maximum payload of a classic CAN frame.
pub const CAN_MAX_DATA_LEN: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanFrame {
    // CAN ID: 11-bit standard or 29-bit extended ID
    pub id: u32,
    // Data Length Code (DLC), number of valid bytes in `data`, 0 to 8
    pub dlc: u8,
    // Payload. Bytes at and beyond `dlc` are ignored on decode.
    pub data: [u8; CAN_MAX_DATA_LEN],
}

impl CanFrame {
    /// Build a frame from an id and a payload of at most 8 bytes.
    ///
    /// Returns `None` when the payload does not fit a classic frame.
    pub fn new(id: u32, payload: &[u8]) -> Option<Self> {
        if payload.len() > CAN_MAX_DATA_LEN {
            return None;
        }
        let mut frame = CanFrame {
            id,
            dlc: payload.len() as u8,
            ..Default::default()
        };
        frame.data[..payload.len()].copy_from_slice(payload);
        Some(frame)
    }

    /// The valid part of the payload.
    pub fn payload(&self) -> &[u8] {
        let len = (self.dlc as usize).min(CAN_MAX_DATA_LEN);
        &self.data[..len]
    }
}
