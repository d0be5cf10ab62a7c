/*!
Typed values and their word framing.

Every value is sent as a frame of one or more 16-bit data words on the lower
half of the register. Wider values are split low word first; the receiver
reassembles them from consecutive samples.
*/

use std::fmt;
use std::str::FromStr;

use num_traits::ToPrimitive;

use crate::port::PortError;
use crate::protocol::MAX_STRING_LEN;
use crate::status::parse_int;

/// A value that can be posted to the port
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// One data word
    Int16(u16),
    /// Two data words, low then high
    Int32(u32),
    /// IEEE-754 bit pattern, sent like [`Value::Int32`]
    Float(f32),
    /// Zero-padded character payload, two bytes per word
    Text { bytes: Vec<u8>, length: usize },
}

impl Value {
    /// Accept anything representable as a signed or unsigned 16-bit integer
    pub fn int16_from_i64(value: i64) -> Result<Self, PortError> {
        value
            .to_u16()
            .or_else(|| value.to_i16().map(|v| v as u16))
            .map(Self::Int16)
            .ok_or_else(|| PortError::argument(format!("{} does not fit in 16 bits", value)))
    }

    /// Accept anything representable as a signed or unsigned 32-bit integer
    pub fn int32_from_i64(value: i64) -> Result<Self, PortError> {
        value
            .to_u32()
            .or_else(|| value.to_i32().map(|v| v as u32))
            .map(Self::Int32)
            .ok_or_else(|| PortError::argument(format!("{} does not fit in 32 bits", value)))
    }

    /// Text payload framed to `length` bytes (rounded up to even)
    pub fn text(text: impl AsRef<[u8]>, length: i64) -> Result<Self, PortError> {
        let length = length
            .to_usize()
            .ok_or_else(|| PortError::argument(format!("invalid string length {}", length)))?;
        check_string_length(length)?;

        Ok(Self::Text {
            bytes: text.as_ref().to_vec(),
            length,
        })
    }

    /// Short name of the value type, used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Float(_) => "float",
            Self::Text { .. } => "string",
        }
    }

    /// Ordered data words making up this value's frame
    pub fn words(&self) -> Vec<u16> {
        match self {
            Self::Int16(word) => vec![*word],
            Self::Int32(value) => split_u32(*value).to_vec(),
            Self::Float(value) => split_u32(value.to_bits()).to_vec(),
            Self::Text { bytes, length } => string_frame(bytes, *length),
        }
    }
}

/// Split a 32-bit value into `[low, high]` data words
pub fn split_u32(value: u32) -> [u16; 2] {
    [(value & 0xFFFF) as u16, (value >> 16) as u16]
}

/// Reject string frames longer than [`MAX_STRING_LEN`] bytes
pub fn check_string_length(length: usize) -> Result<(), PortError> {
    if length > MAX_STRING_LEN {
        return Err(PortError::argument(format!(
            "string length {} exceeds {}",
            length, MAX_STRING_LEN
        )));
    }
    Ok(())
}

/// Frame `text` into `length` bytes (odd lengths round up), stopping the copy
/// at the first zero byte, then pair bytes into words. The first byte of each
/// pair is the low byte of the word. Lengths above [`MAX_STRING_LEN`] are
/// clamped to it.
pub fn string_frame(text: &[u8], length: usize) -> Vec<u16> {
    let length = length.min(MAX_STRING_LEN);
    let length = length + length % 2;
    let mut buffer = vec![0u8; length];

    for (slot, &byte) in buffer.iter_mut().zip(text) {
        if byte == 0 {
            break;
        }
        *slot = byte;
    }

    buffer
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int16(word) => write!(f, "i16:{}", word),
            Self::Int32(value) => write!(f, "i32:{}", value),
            Self::Float(value) => write!(f, "f32:{}", value),
            Self::Text { bytes, length } => {
                write!(f, "str:{}:{}", String::from_utf8_lossy(bytes), length)
            }
        }
    }
}

impl FromStr for Value {
    type Err = PortError;

    /// Parse `i16:<n>`, `i32:<n>`, `f32:<x>` or `str:<text>[:<len>]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, body) = s
            .split_once(':')
            .ok_or_else(|| PortError::argument(format!("expected <type>:<value>, got {:?}", s)))?;

        match kind.to_ascii_lowercase().as_str() {
            "i16" | "int16" => Self::int16_from_i64(parse_int(body)?),
            "i32" | "int32" => Self::int32_from_i64(parse_int(body)?),
            "f32" | "float" => body
                .trim()
                .parse::<f32>()
                .map(Self::Float)
                .map_err(|_| PortError::argument(format!("not a float: {:?}", body))),
            "str" | "string" => {
                // A trailing numeric field is the frame length
                if let Some((text, len)) = body.rsplit_once(':') {
                    if let Ok(length) = parse_int(len) {
                        return Self::text(text, length);
                    }
                }
                Self::text(body, body.len() as i64)
            }
            other => Err(PortError::argument(format!("unknown value type {:?}", other))),
        }
    }
}
