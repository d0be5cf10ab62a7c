/*!
# DT Port - Digital Output Stamping for Python

This Python extension module posts typed values and status bits to a digital
output port that an acquisition system samples alongside its own data. Method
names follow the long-standing camelCase API so existing stimulus scripts keep
working.

## Features

- **Word serialization** of int16, int32, float and string values
- **Running checksum** of every data word posted
- **Status bits** (`DATA`, `SWEEP`, `RUN`, `REFRESH`) with set/clear/toggle
- **Toggle-on-post** masks that flip bits on every write
- **Stability hold** after each write, or `NoDelay` variants to skip it

## Usage

```python
import dt_port

port = dt_port.Port.init_board(bit_shift=0, hold_us=50)
port.setChecksum(0)
port.setBitsNoDelay(dt_port.SWEEP)
port.postInt16NoDelay(12)
port.postString("trial", 8)
print(hex(port.getChecksum()))
port.closeBoard()
```
*/

use pyo3::create_exception;
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyModule};
use pyo3::Bound;
use stamp_core::protocol::{DATA, MAX_POSTABLE_INT, REFRESH, RUN, SWEEP};
use stamp_core::sim::{SimBoard, SimBoardSpec, SimDriver, WriteLog};
use stamp_core::status::mask_from_i64;
use stamp_core::{initialize, Pace, Port, PortConfig, PortError, Value};
use tracing::{debug, warn};

create_exception!(dt_port, ArgumentError, PyValueError, "Malformed or out-of-range argument");
create_exception!(dt_port, HardwareWriteError, PyIOError, "The board rejected a write");
create_exception!(dt_port, BoardError, PyRuntimeError, "Board discovery, configuration or release failed");

fn port_err(e: PortError) -> PyErr {
    match e {
        PortError::Argument(msg) => ArgumentError::new_err(msg),
        other => HardwareWriteError::new_err(other.to_string()),
    }
}

fn int_arg(value: &Bound<'_, PyAny>, what: &str) -> PyResult<i64> {
    value
        .extract::<i64>()
        .map_err(|_| ArgumentError::new_err(format!("{} must be an integer", what)))
}

fn mask_arg(value: &Bound<'_, PyAny>) -> PyResult<u32> {
    mask_from_i64(int_arg(value, "mask")?).map_err(port_err)
}

fn pace(no_delay: bool) -> Pace {
    if no_delay {
        Pace::Immediate
    } else {
        Pace::Hold
    }
}

/// Python handle on an initialized digital output port
#[pyclass(name = "Port", unsendable)]
pub struct PyPort {
    inner: Option<Port<SimBoard>>,
    log: WriteLog,
}

impl PyPort {
    fn port(&mut self) -> PyResult<&mut Port<SimBoard>> {
        self.inner
            .as_mut()
            .ok_or_else(|| BoardError::new_err("board is closed"))
    }

    fn post_int16(&mut self, value: &Bound<'_, PyAny>, no_delay: bool) -> PyResult<()> {
        let value = Value::int16_from_i64(int_arg(value, "value")?).map_err(port_err)?;
        self.port()?.post_value(&value, pace(no_delay)).map_err(port_err)
    }

    fn bit_op(&mut self, op: fn(&mut Port<SimBoard>, u32, Pace) -> Result<(), PortError>, mask: &Bound<'_, PyAny>, no_delay: bool) -> PyResult<()> {
        let mask = mask_arg(mask)?;
        op(self.port()?, mask, pace(no_delay)).map_err(port_err)
    }
}

#[pymethods]
impl PyPort {
    /// Acquire the first usable board and return a port on it
    ///
    /// Args:
    ///     bit_shift: Bits to shift every value up by before writing (0-31)
    ///     hold_us: Stability hold after each delayed write, in microseconds
    ///     boards: Simulated board names to probe in order (default: one DT340)
    #[staticmethod]
    #[pyo3(signature = (bit_shift=0, hold_us=50, boards=None))]
    fn init_board(bit_shift: i64, hold_us: i64, boards: Option<Vec<String>>) -> PyResult<Self> {
        let bit_shift = u32::try_from(bit_shift)
            .map_err(|_| ArgumentError::new_err(format!("bit_shift {} out of range", bit_shift)))?;
        let hold_us = u64::try_from(hold_us)
            .map_err(|_| ArgumentError::new_err(format!("hold_us {} must not be negative", hold_us)))?;

        let config = PortConfig { bit_shift, hold_us, ..PortConfig::default() };
        config.validate().map_err(|e| ArgumentError::new_err(e.to_string()))?;

        let boards = boards.unwrap_or_else(|| vec!["DT340".to_string()]);
        let mut driver = SimDriver::new(boards.into_iter().map(SimBoardSpec::new).collect());
        let log = driver.log();

        let device = initialize(&mut driver, &config.dout_config())
            .map_err(|e| BoardError::new_err(e.to_string()))?;
        let port = Port::from_config(device, &config).map_err(port_err)?;
        debug!("Port ready (bit shift {}, hold {} us)", bit_shift, hold_us);

        Ok(PyPort { inner: Some(port), log })
    }

    #[pyo3(name = "postInt16")]
    fn post_int16_delayed(&mut self, value: &Bound<'_, PyAny>) -> PyResult<()> {
        self.post_int16(value, false)
    }

    #[pyo3(name = "postInt16NoDelay")]
    fn post_int16_no_delay(&mut self, value: &Bound<'_, PyAny>) -> PyResult<()> {
        self.post_int16(value, true)
    }

    /// Post a 32-bit integer as low word then high word
    #[pyo3(name = "postInt32")]
    fn post_int32(&mut self, value: &Bound<'_, PyAny>) -> PyResult<()> {
        let value = Value::int32_from_i64(int_arg(value, "value")?).map_err(port_err)?;
        self.port()?.post_value(&value, Pace::Hold).map_err(port_err)
    }

    /// Post the IEEE-754 single-precision bits of a number
    #[pyo3(name = "postFloat")]
    fn post_float(&mut self, value: &Bound<'_, PyAny>) -> PyResult<()> {
        let value = value
            .extract::<f64>()
            .map_err(|_| ArgumentError::new_err("value must be a number"))?;
        self.port()?.post_float(value as f32, Pace::Hold).map_err(port_err)
    }

    /// Post a string (str or bytes) padded to an even number of bytes
    #[pyo3(name = "postString")]
    fn post_string(&mut self, text: &Bound<'_, PyAny>, length: &Bound<'_, PyAny>) -> PyResult<()> {
        let length = int_arg(length, "length")?;
        let bytes = if let Ok(bytes) = text.downcast::<PyBytes>() {
            bytes.as_bytes().to_vec()
        } else if let Ok(s) = text.extract::<String>() {
            s.into_bytes()
        } else {
            return Err(ArgumentError::new_err("text must be str or bytes"));
        };
        let value = Value::text(bytes, length).map_err(port_err)?;
        self.port()?.post_value(&value, Pace::Hold).map_err(port_err)
    }

    /// Toggle these bits on every following write
    #[pyo3(name = "toggleBitsOnPost")]
    fn toggle_bits_on_post(&mut self, mask: &Bound<'_, PyAny>) -> PyResult<()> {
        let mask = mask_arg(mask)?;
        self.port()?.toggle_bits_on_post(mask);
        Ok(())
    }

    #[pyo3(name = "setBits")]
    fn set_bits(&mut self, mask: &Bound<'_, PyAny>) -> PyResult<()> {
        self.bit_op(Port::set_bits, mask, false)
    }

    #[pyo3(name = "setBitsNoDelay")]
    fn set_bits_no_delay(&mut self, mask: &Bound<'_, PyAny>) -> PyResult<()> {
        self.bit_op(Port::set_bits, mask, true)
    }

    #[pyo3(name = "clearBits")]
    fn clear_bits(&mut self, mask: &Bound<'_, PyAny>) -> PyResult<()> {
        self.bit_op(Port::clear_bits, mask, false)
    }

    #[pyo3(name = "clearBitsNoDelay")]
    fn clear_bits_no_delay(&mut self, mask: &Bound<'_, PyAny>) -> PyResult<()> {
        self.bit_op(Port::clear_bits, mask, true)
    }

    #[pyo3(name = "toggleBits")]
    fn toggle_bits(&mut self, mask: &Bound<'_, PyAny>) -> PyResult<()> {
        self.bit_op(Port::toggle_bits, mask, false)
    }

    #[pyo3(name = "toggleBitsNoDelay")]
    fn toggle_bits_no_delay(&mut self, mask: &Bound<'_, PyAny>) -> PyResult<()> {
        self.bit_op(Port::toggle_bits, mask, true)
    }

    #[pyo3(name = "getChecksum")]
    fn get_checksum(&mut self) -> PyResult<u16> {
        Ok(self.port()?.checksum())
    }

    #[pyo3(name = "setChecksum")]
    fn set_checksum(&mut self, value: &Bound<'_, PyAny>) -> PyResult<()> {
        let value = int_arg(value, "checksum")?;
        let value = u16::try_from(value)
            .map_err(|_| ArgumentError::new_err(format!("checksum {} outside 0..=65535", value)))?;
        self.port()?.set_checksum(value);
        Ok(())
    }

    /// Release the board; later calls raise BoardError
    #[pyo3(name = "closeBoard")]
    fn close_board(&mut self) -> PyResult<()> {
        match self.inner.take() {
            Some(port) => port.shutdown().map_err(|e| BoardError::new_err(e.to_string())),
            None => Ok(()),
        }
    }

    /// Last logical register value, before shift
    #[getter]
    fn register(&mut self) -> PyResult<u32> {
        Ok(self.port()?.register())
    }

    /// Raw values that reached the simulated board, in order
    #[getter]
    fn writes(&self) -> Vec<u32> {
        self.log.borrow().clone()
    }
}

impl Drop for PyPort {
    fn drop(&mut self) {
        if let Some(port) = self.inner.take() {
            if let Err(e) = port.shutdown() {
                warn!("Releasing board on drop: {}", e);
            }
        }
    }
}

/// Python module definition
#[pymodule]
fn dt_port(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    m.add_class::<PyPort>()?;
    m.add("ArgumentError", py.get_type_bound::<ArgumentError>())?;
    m.add("HardwareWriteError", py.get_type_bound::<HardwareWriteError>())?;
    m.add("BoardError", py.get_type_bound::<BoardError>())?;

    m.add("DATA", DATA)?;
    m.add("SWEEP", SWEEP)?;
    m.add("RUN", RUN)?;
    m.add("REFRESH", REFRESH)?;
    m.add("MAXPOSTABLEINT", MAX_POSTABLE_INT)?;
    m.add("__version__", stamp_core::VERSION)?;

    // Add module docstring
    m.add("__doc__", "Typed value stamping on a digital output port")?;

    Ok(())
}
