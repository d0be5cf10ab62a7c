/*!
Named status bits on the upper register word.

These are the sync lines the acquisition panel watches. Masks may be written
as names (`sweep|run`), numbers (`0x20000`, `131072`) or a mix of both.
*/

use serde::{Deserialize, Serialize};

use crate::port::PortError;
use crate::protocol::{DATA, REFRESH, RUN, SWEEP};

/// Status bits used for sweep stamping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum StatusBit {
    Data = DATA,
    Sweep = SWEEP,
    Run = RUN,
    Refresh = REFRESH,
}

impl StatusBit {
    pub const ALL: [StatusBit; 4] = [Self::Data, Self::Sweep, Self::Run, Self::Refresh];

    /// Register mask for this bit
    pub fn mask(self) -> u32 {
        self as u32
    }

    /// Parse a status bit name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "data" | "datastrobe" => Some(Self::Data),
            "sweep" | "displaysweep" => Some(Self::Sweep),
            "run" | "displayrunning" => Some(Self::Run),
            "refresh" | "frametoggle" => Some(Self::Refresh),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Sweep => "sweep",
            Self::Run => "run",
            Self::Refresh => "refresh",
        }
    }

    /// Status bits present in `mask`
    pub fn decompose(mask: u32) -> Vec<StatusBit> {
        Self::ALL.into_iter().filter(|bit| mask & bit.mask() != 0).collect()
    }
}

/// Parse a signed or unsigned integer in decimal or `0x` hexadecimal
pub fn parse_int(text: &str) -> Result<i64, PortError> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let (radix, body) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };

    // Only the leading '-' may carry a sign
    let body = body.replace('_', "");
    let magnitude = Some(body.as_str())
        .filter(|b| !b.starts_with(&['+', '-'][..]))
        .and_then(|b| i64::from_str_radix(b, radix).ok())
        .ok_or_else(|| PortError::argument(format!("not an integer: {:?}", text)))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Parse a 32-bit mask such as `sweep|run`, `0x00020000` or `data|0x10`
pub fn parse_mask(text: &str) -> Result<u32, PortError> {
    let mut mask = 0u32;
    for part in text.split(&['|', ',', '+'][..]) {
        let part = part.trim();
        if part.is_empty() {
            return Err(PortError::argument(format!("empty term in mask {:?}", text)));
        }
        mask |= match StatusBit::from_name(part) {
            Some(bit) => bit.mask(),
            None => mask_from_i64(parse_int(part)?)?,
        };
    }
    Ok(mask)
}

/// Accept any value representable as a 32-bit signed or unsigned integer
pub fn mask_from_i64(value: i64) -> Result<u32, PortError> {
    use num_traits::ToPrimitive;

    value
        .to_u32()
        .or_else(|| value.to_i32().map(|v| v as u32))
        .ok_or_else(|| PortError::argument(format!("{} does not fit in 32 bits", value)))
}
