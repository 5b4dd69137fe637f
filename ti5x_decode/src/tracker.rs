//! Instruction cycle framing
//!
//! The tracker runs once per sample. An instruction cycle starts on the falling edge of IDLE;
//! every following PHI1 pulse is one bit slot, S0 through S15. EXT and IRG are integrated over
//! the PHI1 high phase, so a line that reads high for any sample of the pulse yields a 1.
//!
//! ```text
//! AwaitCycleStart --IDLE falls--> AwaitClockHigh --PHI1 high--> SlotStart --> SlotSampling
//!        ^                               ^                                          |
//!        |                               +------------- S0..S14 ---- SlotEnd <--PHI1 low
//!        +------------------------------------------------ S15 ------'
//! ```
//!
//! IDLE falling again before S15 ends abandons the cycle with a warning and starts a new one.
//! PHI1 pulses after S15 and before the next IDLE edge are reported as out-of-range slots.

use tracing::{debug, warn};

use crate::annotation::{Annotation, AnnotationSink, Category, SinkError};
use crate::config::{ConfigError, DecoderConfig};
use crate::instr;
use crate::pins::Sample;
use crate::timing::{CycleTimer, Mode, elapsed, format_duration};
use crate::word::{BitSlot, InstructionCycle, Line, Revision, SLOTS};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Waiting for IDLE to fall.
    AwaitCycleStart,
    /// Waiting for the next PHI1 pulse.
    AwaitClockHigh,
    /// PHI1 just went high.
    SlotStart(BitSlot),
    /// PHI1 is high.
    SlotSampling(BitSlot),
    /// PHI1 just went low.
    SlotEnd(BitSlot),
}

/// PHI1 pulses seen after S15.
#[derive(Debug, Clone, Copy)]
struct Overrun {
    ordinal: u8,
    slot: Option<BitSlot>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackerStats {
    /// Complete cycles.
    pub cycles: u64,
    /// Cycles cut short by an early IDLE edge.
    pub abandoned: u64,
    /// Cycle in progress at the end of the trace.
    pub truncated: u64,
    /// Out-of-range slots.
    pub overruns: u64,
    /// Cycles with a decoded mnemonic.
    pub instructions: u64,
}

#[derive(Debug)]
pub struct FrameTracker {
    state: FrameState,
    samplerate: u64,
    revision: Revision,
    capture_io: bool,
    timer: CycleTimer,
    prev: Option<Sample>,
    /// Cycle in progress. Its slot count is the current ordinal.
    cycle: InstructionCycle,
    overrun: Option<Overrun>,
    stats: TrackerStats,
}
impl FrameTracker {
    pub fn new(config: &DecoderConfig) -> Result<Self, ConfigError> {
        let samplerate = config.validate()?;
        Ok(Self {
            state: FrameState::AwaitCycleStart,
            samplerate,
            revision: config.revision,
            capture_io: config.capture_io,
            timer: CycleTimer::default(),
            prev: None,
            cycle: InstructionCycle::new(0),
            overrun: None,
            stats: TrackerStats::default(),
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    fn ordinal(&self) -> u8 {
        self.cycle.slots.len() as u8
    }

    /// Processes one sample. Returns the cycle completed by this sample, if any.
    pub fn step(
        &mut self,
        sample: Sample,
        sink: &mut impl AnnotationSink,
    ) -> Result<Option<InstructionCycle>, SinkError> {
        let Some(prev) = self.prev.replace(sample) else {
            // The first sample only establishes the line levels.
            self.timer = CycleTimer::new(sample.index);
            return Ok(None);
        };
        let (idx, pins) = (sample.index, sample.pins);

        let mut completed = None;
        if prev.pins.get_idle() && !pins.get_idle() {
            // A slot whose PHI1 falls together with IDLE still counts.
            if let (FrameState::SlotSampling(slot), false) = (self.state, pins.get_phi1()) {
                completed = self.end_slot(slot, sample, sink)?;
            }
            if self.state != FrameState::AwaitCycleStart {
                self.abandon(idx, sink)?;
            }
            self.close_overrun(idx, sink)?;
            self.start_cycle(idx, sink)?;
        } else if self.state == FrameState::AwaitCycleStart {
            self.track_overrun(sample, sink)?;
            return Ok(None);
        }

        let phi1 = pins.get_phi1();
        loop {
            match (self.state, phi1) {
                (FrameState::AwaitCycleStart, _) | (FrameState::AwaitClockHigh, false) => break,
                (FrameState::AwaitClockHigh, true) => {
                    let slot = BitSlot::latch(self.ordinal(), idx, pins);
                    self.state = FrameState::SlotStart(slot);
                }
                (FrameState::SlotStart(slot), _) => {
                    let text = format!("S{}", slot.ordinal);
                    sink.push(Annotation::new(idx, idx, Category::StateMarker, text))?;
                    self.state = FrameState::SlotSampling(slot);
                    break;
                }
                (FrameState::SlotSampling(mut slot), true) => {
                    slot.accumulate(pins);
                    self.state = FrameState::SlotSampling(slot);
                    break;
                }
                (FrameState::SlotSampling(slot), false) => {
                    self.state = FrameState::SlotEnd(slot);
                }
                (FrameState::SlotEnd(slot), _) => return self.end_slot(slot, sample, sink),
            }
        }
        Ok(completed)
    }

    /// Flushes a cycle or out-of-range slot left in progress at the end of the trace. A partial
    /// cycle is returned without words.
    pub fn finish(
        &mut self,
        sink: &mut impl AnnotationSink,
    ) -> Result<Option<InstructionCycle>, SinkError> {
        self.finish_at(None, sink)
    }

    /// Like [`FrameTracker::finish`], for sources whose last sample index lies beyond the last
    /// sample stepped, such as run-length traces.
    pub fn finish_at(
        &mut self,
        end: Option<u64>,
        sink: &mut impl AnnotationSink,
    ) -> Result<Option<InstructionCycle>, SinkError> {
        let stepped = self.prev.map_or(self.cycle.start, |s| s.index);
        let last = end.map_or(stepped, |end| end.max(stepped));
        if self.state == FrameState::AwaitCycleStart {
            self.close_overrun(last, sink)?;
            return Ok(None);
        }
        let ordinal = self.ordinal();
        warn!(start = self.cycle.start, end = last, "truncated cycle at S{ordinal}");
        let text = format!("truncated cycle at S{ordinal}");
        sink.push(Annotation::new(self.cycle.start, last, Category::Warning, text))?;
        self.stats.truncated += 1;
        self.state = FrameState::AwaitCycleStart;
        self.overrun = None;
        let mut cycle = std::mem::replace(&mut self.cycle, InstructionCycle::new(last));
        cycle.end = last;
        Ok(Some(cycle))
    }

    fn start_cycle(&mut self, idx: u64, sink: &mut impl AnnotationSink) -> Result<(), SinkError> {
        let previous = self.timer.lap(idx);
        let text = format_duration(elapsed(previous, idx, self.samplerate));
        sink.push(Annotation::new(previous, idx, Category::CycleTiming, text))?;
        self.cycle = InstructionCycle::new(idx);
        self.overrun = None;
        self.state = FrameState::AwaitClockHigh;
        Ok(())
    }

    fn abandon(&mut self, idx: u64, sink: &mut impl AnnotationSink) -> Result<(), SinkError> {
        let ordinal = self.ordinal();
        warn!(start = self.cycle.start, end = idx, "cycle abandoned at S{ordinal}");
        let text = format!("cycle abandoned at S{ordinal}");
        sink.push(Annotation::new(self.cycle.start, idx, Category::Warning, text))?;
        self.stats.abandoned += 1;
        Ok(())
    }

    fn push_bits(
        &self,
        slot: &BitSlot,
        end: u64,
        sink: &mut impl AnnotationSink,
    ) -> Result<(), SinkError> {
        let bit = |b: bool| u8::from(b).to_string();
        let ext = Category::RawBit(Line::Ext);
        sink.push(Annotation::new(slot.start, end, ext, bit(slot.ext.bit())))?;
        let irg = Category::RawBit(Line::Irg);
        sink.push(Annotation::new(slot.start, end, irg, bit(slot.irg.bit())))?;
        if self.capture_io {
            let io = Category::RawBit(Line::Io);
            sink.push(Annotation::new(slot.start, end, io, format!("{:X}", slot.io)))?;
        }
        Ok(())
    }

    fn end_slot(
        &mut self,
        slot: BitSlot,
        sample: Sample,
        sink: &mut impl AnnotationSink,
    ) -> Result<Option<InstructionCycle>, SinkError> {
        let idx = sample.index;
        self.push_bits(&slot, idx, sink)?;
        if slot.ordinal == 1 {
            let mode = Mode::from_idle(sample.pins.get_idle());
            self.cycle.mode = Some(mode);
            let span = Category::ModeSpan(mode);
            sink.push(Annotation::new(slot.start, idx, span, mode.to_string()))?;
        }
        self.cycle.slots.push(slot);
        if slot.ordinal + 1 < SLOTS {
            self.state = FrameState::AwaitClockHigh;
            return Ok(None);
        }
        self.state = FrameState::AwaitCycleStart;
        self.overrun = Some(Overrun {
            ordinal: SLOTS,
            slot: None,
        });
        self.complete(sample, sink).map(Some)
    }

    fn complete(
        &mut self,
        sample: Sample,
        sink: &mut impl AnnotationSink,
    ) -> Result<InstructionCycle, SinkError> {
        let idx = sample.index;
        let mut cycle = std::mem::replace(&mut self.cycle, InstructionCycle::new(idx));
        cycle.end = idx;
        if let (Some(ext), Some(irg)) = (cycle.ext(), cycle.irg()) {
            let ext_word = Category::WordValue(Line::Ext);
            sink.push(Annotation::new(cycle.start, idx, ext_word, ext.to_string()))?;
            let irg_word = Category::WordValue(Line::Irg);
            sink.push(Annotation::new(cycle.start, idx, irg_word, irg.to_string()))?;
            if self.capture_io {
                let text: String = cycle.io().iter().map(|n| format!("{n:X}")).collect();
                let io_word = Category::WordValue(Line::Io);
                sink.push(Annotation::new(cycle.start, idx, io_word, text))?;
            }
            if !(ext.is_stable() && irg.is_stable()) {
                debug!(
                    start = cycle.start,
                    ext = format_args!("{:016b}", ext.stable()),
                    irg = format_args!("{:016b}", irg.stable()),
                    "unstable bits"
                );
            }
            cycle.mnemonic = instr::decode_word(irg, self.revision);
            if let Some(mnemonic) = &cycle.mnemonic {
                let text = mnemonic.clone();
                sink.push(Annotation::new(cycle.start, idx, Category::Instruction, text))?;
                self.stats.instructions += 1;
            }
            debug!(
                start = cycle.start,
                end = idx,
                t = sample.time(self.samplerate),
                ext = %ext,
                irg = %irg,
                mnemonic = ?cycle.mnemonic,
                "cycle"
            );
        }
        self.stats.cycles += 1;
        Ok(cycle)
    }

    fn track_overrun(
        &mut self,
        sample: Sample,
        sink: &mut impl AnnotationSink,
    ) -> Result<(), SinkError> {
        let Some(mut overrun) = self.overrun else {
            return Ok(());
        };
        let (idx, pins) = (sample.index, sample.pins);
        match (overrun.slot, pins.get_phi1()) {
            (None, false) => (),
            (None, true) => overrun.slot = Some(BitSlot::latch(overrun.ordinal, idx, pins)),
            (Some(mut slot), true) => {
                slot.accumulate(pins);
                overrun.slot = Some(slot);
            }
            (Some(_), false) => {
                self.close_overrun(idx, sink)?;
                return Ok(());
            }
        }
        self.overrun = Some(overrun);
        Ok(())
    }

    /// Reports an out-of-range slot still open at `idx`.
    fn close_overrun(&mut self, idx: u64, sink: &mut impl AnnotationSink) -> Result<(), SinkError> {
        let Some(Overrun {
            ordinal,
            slot: Some(slot),
        }) = self.overrun
        else {
            return Ok(());
        };
        warn!(start = slot.start, end = idx, "slot S{} out of range", slot.ordinal);
        let text = format!("slot S{} out of range", slot.ordinal);
        sink.push(Annotation::new(slot.start, idx, Category::Error, text))?;
        self.push_bits(&slot, idx, sink)?;
        self.stats.overruns += 1;
        self.overrun = Some(Overrun {
            ordinal: ordinal.saturating_add(1),
            slot: None,
        });
        Ok(())
    }
}
