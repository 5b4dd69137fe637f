//! TI-5x bus pins

use crate::bits;

/// Channel order of a captured trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Pin {
    Idle,
    Ext,
    Irg,
    Io8,
    Io4,
    Io2,
    Io1,
    Phi1,
}
impl Pin {
    pub const ALL: [Pin; 8] = [
        Pin::Idle,
        Pin::Ext,
        Pin::Irg,
        Pin::Io8,
        Pin::Io4,
        Pin::Io2,
        Pin::Io1,
        Pin::Phi1,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pin::Idle => "IDLE",
            Pin::Ext => "EXT",
            Pin::Irg => "IRG",
            Pin::Io8 => "IO8",
            Pin::Io4 => "IO4",
            Pin::Io2 => "IO2",
            Pin::Io1 => "IO1",
            Pin::Phi1 => "PHI1",
        }
    }

    /// Looks up a channel by name, case insensitive. `T1` is accepted as an alias for PHI1.
    pub fn from_name(name: &str) -> Option<Pin> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("t1") {
            return Some(Pin::Phi1);
        }
        Pin::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }
}

/// One sampled pin vector. Bit `n` holds the pin whose discriminant is `n`.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Ti5xPins(pub u8);
impl std::fmt::Debug for Ti5xPins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Ti5xPins")
            .field(&self.to_string())
            .finish()
    }
}
impl std::fmt::Display for Ti5xPins {
    /// Renders the vector in channel order, as used by `.lst` traces.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for pin in Pin::ALL {
            write!(f, "{}", self.get(pin) as u8)?;
        }
        Ok(())
    }
}
impl Ti5xPins {
    pub fn get(self, pin: Pin) -> bool {
        bits::get_1(self.0, pin as u8)
    }
    pub fn set(&mut self, pin: Pin, val: bool) {
        self.0 = bits::set_1(self.0, pin as u8, val);
    }
    #[must_use]
    pub fn with(mut self, pin: Pin, val: bool) -> Self {
        self.set(pin, val);
        self
    }

    /// Instruction cycle marker.
    pub fn get_idle(self) -> bool {
        self.get(Pin::Idle)
    }

    /// Serial data line.
    pub fn get_ext(self) -> bool {
        self.get(Pin::Ext)
    }

    /// Serial command line.
    pub fn get_irg(self) -> bool {
        self.get(Pin::Irg)
    }

    /// Clock phase 1.
    pub fn get_phi1(self) -> bool {
        self.get(Pin::Phi1)
    }

    /// Parallel data bus, IO8 as the most significant bit.
    pub fn get_io(self) -> u8 {
        (self.get(Pin::Io8) as u8) << 3
            | (self.get(Pin::Io4) as u8) << 2
            | (self.get(Pin::Io2) as u8) << 1
            | self.get(Pin::Io1) as u8
    }
    pub fn set_io(&mut self, val: u8) {
        self.set(Pin::Io8, val & 0x8 != 0);
        self.set(Pin::Io4, val & 0x4 != 0);
        self.set(Pin::Io2, val & 0x2 != 0);
        self.set(Pin::Io1, val & 0x1 != 0);
    }
}

/// A pin vector at a position in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub index: u64,
    pub pins: Ti5xPins,
}
impl Sample {
    pub fn new(index: u64, pins: Ti5xPins) -> Self {
        Self { index, pins }
    }

    /// Time since the start of the trace, in seconds.
    pub fn time(&self, samplerate: u64) -> f64 {
        self.index as f64 / samplerate as f64
    }
}
