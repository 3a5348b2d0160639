//! Recording mock adapter shared by the unit tests

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::adapter::{AdapterPort, AuxPin, OpenParams, SpiAdapter};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(OpenParams),
    PinHigh(AuxPin),
    PinLow(AuxPin),
    AssertSelect,
    DeassertSelect,
    Write(Vec<u8>),
    Read(usize),
    Close,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn close_count(&self) -> usize {
        self.0.borrow().iter().filter(|c| **c == Call::Close).count()
    }

    pub fn write_count(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Write(_)))
            .count()
    }
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    echo: bool,
    latency: usize,
    clock_limit: Option<u32>,
    fail_open: bool,
    fail_pins: bool,
    fail_write_after: Option<usize>,
    corrupt_offset: Option<usize>,
    cancel_after: Option<(usize, CancelToken)>,
}

pub struct MockAdapter {
    log: CallLog,
    behavior: Behavior,
}

impl MockAdapter {
    /// Loop-back wiring: reads return what was written in the transaction
    pub fn echo() -> Self {
        Self {
            log: CallLog::default(),
            behavior: Behavior {
                echo: true,
                ..Behavior::default()
            },
        }
    }

    /// Nothing connected: reads return 0xFF
    pub fn silent() -> Self {
        Self {
            log: CallLog::default(),
            behavior: Behavior::default(),
        }
    }

    pub fn failing_open() -> Self {
        let mut adapter = Self::echo();
        adapter.behavior.fail_open = true;
        adapter
    }

    pub fn with_latency(mut self, bytes: usize) -> Self {
        self.behavior.latency = bytes;
        self
    }

    pub fn with_clock_limit(mut self, hz: u32) -> Self {
        self.behavior.clock_limit = Some(hz);
        self
    }

    pub fn with_failing_pins(mut self) -> Self {
        self.behavior.fail_pins = true;
        self
    }

    pub fn with_failing_write_after(mut self, writes: usize) -> Self {
        self.behavior.fail_write_after = Some(writes);
        self
    }

    /// Flip every bit of the echoed byte at `offset` in each transaction
    pub fn with_corruption(mut self, offset: usize) -> Self {
        self.behavior.corrupt_offset = Some(offset);
        self
    }

    /// Cancel `token` once `writes` writes have completed
    pub fn with_cancel_after(mut self, writes: usize, token: CancelToken) -> Self {
        self.behavior.cancel_after = Some((writes, token));
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl SpiAdapter for MockAdapter {
    type Port = MockPort;

    fn open(self, params: &OpenParams) -> Result<MockPort> {
        if self.behavior.fail_open {
            return Err(Error::AdapterOpenFailed);
        }
        self.log.push(Call::Open(*params));

        let clock_hz = match self.behavior.clock_limit {
            Some(limit) => params.clock_hz.min(limit),
            None => params.clock_hz,
        };

        Ok(MockPort {
            log: self.log,
            behavior: self.behavior,
            clock_hz,
            pending: VecDeque::new(),
            echoed: 0,
            writes: 0,
        })
    }
}

pub struct MockPort {
    log: CallLog,
    behavior: Behavior,
    clock_hz: u32,
    pending: VecDeque<u8>,
    echoed: usize,
    writes: usize,
}

impl AdapterPort for MockPort {
    fn description(&self) -> &str {
        "Mock loop-back adapter"
    }

    fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn pin_high(&mut self, pin: AuxPin) -> Result<()> {
        if self.behavior.fail_pins {
            return Err(Error::PinControlFailed);
        }
        self.log.push(Call::PinHigh(pin));
        Ok(())
    }

    fn pin_low(&mut self, pin: AuxPin) -> Result<()> {
        if self.behavior.fail_pins {
            return Err(Error::PinControlFailed);
        }
        self.log.push(Call::PinLow(pin));
        Ok(())
    }

    fn assert_select(&mut self) -> Result<()> {
        self.log.push(Call::AssertSelect);
        self.pending.clear();
        self.pending.extend(core::iter::repeat(0xFF).take(self.behavior.latency));
        self.echoed = 0;
        Ok(())
    }

    fn deassert_select(&mut self) -> Result<()> {
        self.log.push(Call::DeassertSelect);
        self.pending.clear();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if let Some(limit) = self.behavior.fail_write_after {
            if self.writes >= limit {
                return Err(Error::TransferFailed);
            }
        }
        self.log.push(Call::Write(data.to_vec()));
        if self.behavior.echo {
            self.pending.extend(data.iter().copied());
        }
        self.writes += 1;

        if let Some((after, token)) = &self.behavior.cancel_after {
            if self.writes >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.log.push(Call::Read(buf.len()));
        for byte in buf.iter_mut() {
            let mut value = self.pending.pop_front().unwrap_or(0xFF);
            if Some(self.echoed) == self.behavior.corrupt_offset {
                value = !value;
            }
            self.echoed += 1;
            *byte = value;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.push(Call::Close);
        Ok(())
    }
}
