//! Synthetic bus traces
//!
//! Generates the pin vectors of well-formed instruction cycles: IDLE falls at the start of S0,
//! each slot is `low` samples with PHI1 low followed by `high` samples with PHI1 high, and the
//! serial lines carry bit `n` of their word during slot `n`.

use std::io::Write;

use itertools::Itertools;

use crate::pins::{Pin, Ti5xPins};
use crate::timing::Mode;
use crate::word::SLOTS;

/// Contents of one synthetic cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSpec {
    pub ext: u16,
    pub irg: u16,
    pub mode: Mode,
    /// IO8..IO1 during every slot.
    pub io: u8,
}
impl CycleSpec {
    pub fn new(ext: u16, irg: u16) -> Self {
        Self {
            ext,
            irg,
            mode: Mode::Calculate,
            io: 0,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_io(mut self, io: u8) -> Self {
        self.io = io;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TraceBuilder {
    samples: Vec<Ti5xPins>,
    low: usize,
    high: usize,
}
impl Default for TraceBuilder {
    fn default() -> Self {
        Self::new(2, 2)
    }
}
impl TraceBuilder {
    /// Starts a trace with `low` idle samples.
    pub fn new(low: usize, high: usize) -> Self {
        assert!(low > 0 && high > 0);
        let mut this = Self {
            samples: vec![],
            low,
            high,
        };
        this.idle(low);
        this
    }

    /// IDLE high, PHI1 low.
    pub fn idle(&mut self, n: usize) -> &mut Self {
        self.push(Ti5xPins::default().with(Pin::Idle, true), n)
    }

    pub fn push(&mut self, pins: Ti5xPins, n: usize) -> &mut Self {
        self.samples.extend(std::iter::repeat_n(pins, n));
        self
    }

    /// Appends `slots` slots of a cycle, starting with the IDLE falling edge. A full cycle is
    /// followed by `low` idle samples, which end S15 and re-arm IDLE.
    pub fn partial_cycle(&mut self, spec: CycleSpec, slots: u8) -> &mut Self {
        for n in 0..slots {
            let idle = n >= 1 && spec.mode == Mode::Calculate;
            let mut pins = Ti5xPins::default()
                .with(Pin::Idle, idle)
                .with(Pin::Ext, spec.ext & (1 << n) != 0)
                .with(Pin::Irg, spec.irg & (1 << n) != 0);
            pins.set_io(spec.io);
            self.push(pins, self.low);
            self.push(pins.with(Pin::Phi1, true), self.high);
        }
        self
    }

    pub fn cycle(&mut self, spec: CycleSpec) -> &mut Self {
        self.samples.reserve(self.cycle_len());
        self.partial_cycle(spec, SLOTS);
        self.idle(self.low)
    }

    /// Samples per full cycle, including the trailing idle samples.
    pub fn cycle_len(&self) -> usize {
        usize::from(SLOTS) * (self.low + self.high) + self.low
    }

    pub fn build(&self) -> Vec<Ti5xPins> {
        self.samples.clone()
    }

    /// Writes the trace in `.lst` form, collapsing runs of identical vectors.
    pub fn write_lst(&self, w: &mut impl Write, samplerate: Option<u64>) -> std::io::Result<()> {
        writeln!(w, "# IDLE EXT IRG IO8 IO4 IO2 IO1 PHI1")?;
        if let Some(rate) = samplerate {
            writeln!(w, "@samplerate {rate}")?;
        }
        for (n, pins) in self.samples.iter().dedup_with_count() {
            if n == 1 {
                writeln!(w, "{pins}")?;
            } else {
                writeln!(w, "{pins} *{n}")?;
            }
        }
        Ok(())
    }
}
