//! Cycle timing and operating mode

use std::fmt::Display;

/// Operating mode of an instruction cycle.
///
/// In calculate mode IDLE returns high right after S0; in display mode it stays low while the
/// display is being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Calculate,
    Display,
}
impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mode::Calculate => "CALCULATE",
            Mode::Display => "DISPLAY",
        })
    }
}
impl Mode {
    /// Classifies a cycle from the IDLE level sampled at the end of S1.
    pub fn from_idle(idle: bool) -> Self {
        if idle { Mode::Calculate } else { Mode::Display }
    }
}

/// Tracks the start of the previous instruction cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleTimer {
    previous_start: u64,
}
impl CycleTimer {
    pub fn new(origin: u64) -> Self {
        Self {
            previous_start: origin,
        }
    }

    /// Records a new cycle start and returns the previous one.
    pub fn lap(&mut self, start: u64) -> u64 {
        std::mem::replace(&mut self.previous_start, start)
    }
}

/// Elapsed seconds between two sample indices.
pub fn elapsed(from: u64, to: u64, samplerate: u64) -> f64 {
    to.saturating_sub(from) as f64 / samplerate as f64
}

/// Formats a duration in seconds with a unit matching its magnitude, followed by the
/// corresponding frequency.
pub fn format_duration(t: f64) -> String {
    let hz = 1. / t;
    let abs = t.abs();
    if abs >= 1. {
        format!("{t:.3} s  ({hz:.3} Hz)")
    } else if abs >= 1e-3 {
        let ms = t * 1e3;
        if hz < 1e3 {
            format!("{ms:.3} ms ({hz:.3} Hz)")
        } else {
            format!("{ms:.3} ms ({:.3} kHz)", hz / 1e3)
        }
    } else if abs >= 1e-6 {
        let us = t * 1e6;
        if hz < 1e6 {
            format!("{us:.3} μs ({:.3} kHz)", hz / 1e3)
        } else {
            format!("{us:.3} μs ({:.3} MHz)", hz / 1e6)
        }
    } else if abs >= 1e-9 {
        let ns = t * 1e9;
        if hz < 1e9 {
            format!("{ns:.3} ns ({:.3} MHz)", hz / 1e6)
        } else {
            format!("{ns:.3} ns ({:.3} GHz)", hz / 1e9)
        }
    } else {
        format!("{t}")
    }
}
