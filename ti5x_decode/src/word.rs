//! Bit slots, serial words and instruction cycles

use std::fmt::Display;

use itertools::Itertools;

use crate::bits;
use crate::pins::Ti5xPins;
use crate::timing::Mode;

/// Number of bit slots in an instruction cycle.
pub const SLOTS: u8 = 16;

/// Width of an instruction body, including the branch flag.
pub const BODY_BITS: u8 = 13;

/// Integrates one serial line over the PHI1 high phase.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Accum {
    /// Samples that read high.
    ones: u32,
    /// Samples read.
    reads: u32,
}
impl Accum {
    fn latch(val: bool) -> Self {
        Self {
            ones: val as u32,
            reads: 1,
        }
    }

    fn add(&mut self, val: bool) {
        self.ones = self.ones.saturating_add(val as u32);
        self.reads = self.reads.saturating_add(1);
    }

    /// Accumulated value clamped to a single bit.
    pub fn bit(self) -> bool {
        self.ones.min(1) == 1
    }

    /// Whether every read agreed.
    pub fn is_stable(self) -> bool {
        self.ones == 0 || self.ones == self.reads
    }
}

/// One PHI1 pulse within an instruction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSlot {
    pub ordinal: u8,
    /// Sample at which PHI1 went high.
    pub start: u64,
    pub ext: Accum,
    pub irg: Accum,
    /// IO8..IO1, latched when PHI1 went high.
    pub io: u8,
}
impl BitSlot {
    pub fn latch(ordinal: u8, start: u64, pins: Ti5xPins) -> Self {
        Self {
            ordinal,
            start,
            ext: Accum::latch(pins.get_ext()),
            irg: Accum::latch(pins.get_irg()),
            io: pins.get_io(),
        }
    }

    pub fn accumulate(&mut self, pins: Ti5xPins) {
        self.ext.add(pins.get_ext());
        self.irg.add(pins.get_irg());
    }
}

/// Serial data lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Ext,
    Irg,
    Io,
}
impl Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Line::Ext => "EXT",
            Line::Irg => "IRG",
            Line::Io => "IO",
        })
    }
}

/// Sixteen bits captured from one serial line. Bit `n` was sampled during slot `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word {
    value: u16,
    stable: u16,
}
impl Display for Word {
    /// Slot-order digits, grouped by four.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.slot_bits().map(|b| if b { '1' } else { '0' });
        let text = digits
            .chunks(4)
            .map(|group| group.iter().collect::<String>())
            .join(" ");
        f.write_str(&text)
    }
}
impl Word {
    pub fn new(value: u16) -> Self {
        Self {
            value,
            stable: u16::MAX,
        }
    }

    /// Assembles a word from a complete set of slots. Returns `None` for truncated cycles.
    pub fn from_slots(slots: &[BitSlot], line: Line) -> Option<Self> {
        if slots.len() != SLOTS as usize {
            return None;
        }
        let mut word = Self {
            value: 0,
            stable: 0,
        };
        for (n, slot) in slots.iter().enumerate() {
            debug_assert_eq!(usize::from(slot.ordinal), n);
            let acc = match line {
                Line::Ext => slot.ext,
                Line::Irg => slot.irg,
                Line::Io => return None,
            };
            word.value |= (acc.bit() as u16) << n;
            word.stable |= (acc.is_stable() as u16) << n;
        }
        Some(word)
    }

    /// The word as transmitted, least significant bit first.
    pub fn value(self) -> u16 {
        self.value
    }

    /// Per-bit confidence mask.
    pub fn stable(self) -> u16 {
        self.stable
    }

    pub fn is_stable(self) -> bool {
        self.stable == u16::MAX
    }

    pub fn bit(self, slot: u8) -> bool {
        self.value & (1 << slot) != 0
    }

    pub fn slot_bits(self) -> [bool; SLOTS as usize] {
        std::array::from_fn(|n| self.bit(n as u8))
    }

    pub fn from_slot_bits(bits: [bool; SLOTS as usize]) -> Self {
        let value = bits
            .iter()
            .enumerate()
            .fold(0, |acc, (n, &b)| acc | (b as u16) << n);
        Self::new(value)
    }

    /// Strips the framing prefix and returns the instruction body, last slot most significant.
    pub fn instruction_body(self, revision: Revision) -> u16 {
        bits::field(self.value, revision.prefix_slots(), BODY_BITS)
    }
}

/// Hardware revision, which determines how many framing slots precede the instruction body on
/// the IRG line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Revision {
    /// TI-58, TI-58C and TI-59: three framing slots.
    #[default]
    Ti5x,
    /// Earlier decoding, where the body starts at S0.
    Early,
}
impl Revision {
    pub fn prefix_slots(self) -> u8 {
        match self {
            Revision::Ti5x => 3,
            Revision::Early => 0,
        }
    }
}

/// A framed instruction cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionCycle {
    pub start: u64,
    pub end: u64,
    /// Decided at S1; `None` only for cycles truncated before then.
    pub mode: Option<Mode>,
    pub slots: Vec<BitSlot>,
    pub mnemonic: Option<String>,
}
impl InstructionCycle {
    pub fn new(start: u64) -> Self {
        Self {
            start,
            end: start,
            mode: None,
            slots: Vec::with_capacity(SLOTS as usize),
            mnemonic: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.len() == SLOTS as usize
    }

    pub fn ext(&self) -> Option<Word> {
        Word::from_slots(&self.slots, Line::Ext)
    }

    pub fn irg(&self) -> Option<Word> {
        Word::from_slots(&self.slots, Line::Irg)
    }

    /// IO8..IO1 nibble for each slot.
    pub fn io(&self) -> Vec<u8> {
        self.slots.iter().map(|s| s.io).collect()
    }
}
