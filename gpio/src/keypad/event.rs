use crate::{GpioError, GpioResult};

/// The edge a key went through.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum KeyEdge {
    Released = 0,
    Pressed = 1,
}

impl TryFrom<u8> for KeyEdge {
    type Error = GpioError;

    fn try_from(value: u8) -> GpioResult<Self> {
        match value {
            0 => Ok(KeyEdge::Released),
            1 => Ok(KeyEdge::Pressed),
            _ => Err(GpioError::InvalidArgument),
        }
    }
}

/// A press or release reported by a scan, along with where it happened.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct KeyEvent {
    pub edge: KeyEdge,
    /// The identifier from the keymap.
    pub key: u8,
    pub row: u8,
    pub col: u8,
}

impl KeyEvent {
    /// Size of an encoded record in bytes.
    pub const SIZE: usize = 4;

    pub fn new(edge: KeyEdge, key: u8, row: u8, col: u8) -> Self {
        KeyEvent { edge, key, row, col }
    }

    pub fn is_press(&self) -> bool {
        self.edge == KeyEdge::Pressed
    }

    /// Encodes the event as `[edge, key, row, col]`.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        [self.edge as u8, self.key, self.row, self.col]
    }

    /// Decodes a record produced by [KeyEvent::encode].
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the edge byte is neither 0 nor 1.
    pub fn decode(bytes: [u8; Self::SIZE]) -> GpioResult<Self> {
        let [edge, key, row, col] = bytes;
        Ok(KeyEvent {
            edge: edge.try_into()?,
            key,
            row,
            col,
        })
    }
}
