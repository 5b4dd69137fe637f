use assert_matches::assert_matches;
use itertools::Itertools;

use super::{FrameState, FrameTracker, TrackerStats};
use crate::annotation::Annotation;
use crate::config::{ConfigError, DecoderConfig};
use crate::pins::{Pin, Sample, Ti5xPins};
use crate::synth::{CycleSpec, TraceBuilder};
use crate::timing::{Mode, elapsed, format_duration};
use crate::word::{BitSlot, InstructionCycle, Word};

const RATE: u64 = 1_000_000;

/// IRG word carrying `SET IDLE` after the three framing slots.
const SET_IDLE: u16 = 0b0_0000_0001_0101 << 3;
/// IRG word carrying `BRA+ 1`.
const BRA_1: u16 = 0b1_0000_0000_0010 << 3;

fn config() -> DecoderConfig {
    DecoderConfig::default().with_samplerate(RATE)
}

fn run(
    config: &DecoderConfig,
    samples: &[Ti5xPins],
) -> (Vec<InstructionCycle>, Vec<Annotation>, TrackerStats) {
    let mut tracker = FrameTracker::new(config).unwrap();
    let mut sink = vec![];
    let mut cycles = vec![];
    for (n, &pins) in samples.iter().enumerate() {
        let sample = Sample::new(n as u64, pins);
        cycles.extend(tracker.step(sample, &mut sink).unwrap());
    }
    cycles.extend(tracker.finish(&mut sink).unwrap());
    assert_ordered(&sink);
    (cycles, sink, tracker.stats())
}

fn row<'a>(annots: &'a [Annotation], name: &str) -> Vec<&'a Annotation> {
    annots.iter().filter(|a| a.category.row() == name).collect()
}

fn texts(annots: &[Annotation], name: &str) -> Vec<String> {
    row(annots, name).into_iter().map(|a| a.text.clone()).collect()
}

fn spans(annots: &[Annotation], name: &str) -> Vec<(u64, u64)> {
    row(annots, name).into_iter().map(|a| (a.start, a.end)).collect()
}

fn bits(word: u16) -> Vec<String> {
    (0..16).map(|n| ((word >> n) & 1).to_string()).collect()
}

fn assert_ordered(annots: &[Annotation]) {
    for (a, b) in annots.iter().tuple_windows() {
        assert!(a.end <= b.end, "{a:?} pushed before {b:?}");
    }
    let by_row = annots.iter().sorted_by_key(|a| a.category.row());
    for (_, group) in &by_row.chunk_by(|a| a.category.row()) {
        for (a, b) in group.tuple_windows() {
            assert!(a.start <= b.start, "{a:?} pushed before {b:?}");
        }
    }
}

#[test]
fn test_missing_samplerate() {
    assert_matches!(
        FrameTracker::new(&DecoderConfig::default()),
        Err(ConfigError::MissingSampleRate)
    );
}

#[test]
fn test_states() {
    let mut builder = TraceBuilder::new(1, 2);
    builder.cycle(CycleSpec::new(0x0001, 0));
    let samples = builder.build();
    let mut tracker = FrameTracker::new(&config()).unwrap();
    let mut sink = vec![];
    let mut states = vec![];
    for (n, &pins) in samples.iter().enumerate().take(5) {
        assert_eq!(tracker.step(Sample::new(n as u64, pins), &mut sink).unwrap(), None);
        states.push(tracker.state());
    }

    assert_eq!(states[0], FrameState::AwaitCycleStart);
    // IDLE falls.
    assert_eq!(states[1], FrameState::AwaitClockHigh);
    // PHI1 rises; the marker is emitted on the same sample.
    assert_matches!(
        states[2],
        FrameState::SlotSampling(BitSlot { ordinal: 0, start: 2, .. })
    );
    assert_matches!(states[3], FrameState::SlotSampling(slot) => {
        assert!(slot.ext.bit());
        assert!(slot.ext.is_stable());
        assert!(!slot.irg.bit());
    });
    // PHI1 falls and S0 ends.
    assert_eq!(states[4], FrameState::AwaitClockHigh);
    assert_eq!(sink.len(), 4);
    assert_eq!(spans(&sink, "timings"), [(0, 1)]);
    assert_eq!(texts(&sink, "state"), ["S0"]);
    assert_eq!(spans(&sink, "extbits"), [(2, 4)]);
    assert_eq!(texts(&sink, "extbits"), ["1"]);
    assert_eq!(texts(&sink, "irgbits"), ["0"]);
}

#[test]
fn test_single_cycle() {
    let mut builder = TraceBuilder::default();
    builder.cycle(CycleSpec::new(0x1234, SET_IDLE));
    let (cycles, annots, stats) = run(&config(), &builder.build());

    assert_eq!(cycles.len(), 1);
    let cycle = &cycles[0];
    assert_eq!((cycle.start, cycle.end), (2, 66));
    assert!(cycle.is_complete());
    assert_eq!(cycle.mode, Some(Mode::Calculate));
    assert_eq!(cycle.ext(), Some(Word::new(0x1234)));
    assert_eq!(cycle.irg(), Some(Word::new(SET_IDLE)));
    assert_eq!(cycle.mnemonic.as_deref(), Some("SET IDLE"));

    let markers = (0..16).map(|n| format!("S{n}")).collect_vec();
    assert_eq!(texts(&annots, "state"), markers);
    assert_eq!(spans(&annots, "state")[0], (4, 4));
    assert_eq!(texts(&annots, "extbits"), bits(0x1234));
    assert_eq!(texts(&annots, "irgbits"), bits(SET_IDLE));
    assert_eq!(texts(&annots, "extword"), [Word::new(0x1234).to_string()]);
    assert_eq!(texts(&annots, "irgword"), ["0001 0101 0000 0000"]);
    assert_eq!(spans(&annots, "irgword"), [(2, 66)]);
    assert_eq!(texts(&annots, "calc"), ["CALCULATE"]);
    assert_eq!(spans(&annots, "calc"), [(8, 10)]);
    assert!(row(&annots, "disp").is_empty());
    assert_eq!(spans(&annots, "timings"), [(0, 2)]);
    assert_eq!(texts(&annots, "timings"), [format_duration(2e-6)]);
    assert_eq!(texts(&annots, "instructions"), ["SET IDLE"]);
    assert_eq!(spans(&annots, "instructions"), [(2, 66)]);
    assert!(row(&annots, "warnings").is_empty());
    assert!(row(&annots, "errors").is_empty());
    assert!(row(&annots, "iobits").is_empty());
    assert_eq!(
        stats,
        TrackerStats {
            cycles: 1,
            instructions: 1,
            ..Default::default()
        }
    );
}

#[test]
fn test_oversampling() {
    let spec = CycleSpec::new(0xbeef, BRA_1);
    let rows = |low, high| {
        let mut builder = TraceBuilder::new(low, high);
        builder.cycle(spec).cycle(spec.with_mode(Mode::Display));
        let (cycles, annots, _) = run(&config(), &builder.build());
        let rows = annots
            .into_iter()
            .filter(|a| a.category.row() != "timings")
            .map(|a| (a.category, a.text))
            .collect_vec();
        (cycles, rows)
    };
    let (once, once_rows) = rows(1, 1);
    for (low, high) in [(2, 2), (3, 7), (5, 16)] {
        let (many, many_rows) = rows(low, high);
        assert_eq!(many_rows, once_rows, "low {low} high {high}");
        for (a, b) in once.iter().zip(&many) {
            assert_eq!(a.ext(), b.ext());
            assert_eq!(a.irg(), b.irg());
            assert_eq!(a.mode, b.mode);
            assert_eq!(a.mnemonic, b.mnemonic);
        }
    }
}

#[test]
fn test_random_words() {
    for _ in 0..20 {
        let (ext, irg) = (rand::random::<u16>(), rand::random::<u16>());
        let mut builder = TraceBuilder::default();
        builder.cycle(CycleSpec::new(ext, irg));
        let (cycles, annots, _) = run(&config(), &builder.build());
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].ext(), Some(Word::new(ext)));
        assert_eq!(cycles[0].irg(), Some(Word::new(irg)));
        assert_eq!(texts(&annots, "extbits"), bits(ext));
        assert_eq!(texts(&annots, "irgbits"), bits(irg));
    }
}

#[test]
fn test_back_to_back() {
    let mut builder = TraceBuilder::default();
    builder
        .cycle(CycleSpec::new(0x00ff, SET_IDLE))
        .cycle(CycleSpec::new(0xf00f, BRA_1));
    let (cycles, annots, stats) = run(&config(), &builder.build());

    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[1].start, 68);
    assert_eq!(spans(&annots, "timings"), [(0, 2), (2, 68)]);
    assert_eq!(
        texts(&annots, "timings"),
        [format_duration(2e-6), format_duration(elapsed(2, 68, RATE))]
    );
    assert_eq!(
        texts(&annots, "extword"),
        [Word::new(0x00ff).to_string(), Word::new(0xf00f).to_string()]
    );
    assert_eq!(
        texts(&annots, "irgword"),
        [Word::new(SET_IDLE).to_string(), Word::new(BRA_1).to_string()]
    );
    assert_eq!(texts(&annots, "instructions"), ["SET IDLE", "BRA+ 1"]);
    assert_eq!(row(&annots, "extbits").len(), 32);
    assert_eq!(row(&annots, "irgbits").len(), 32);
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.instructions, 2);
}

#[test]
fn test_unmatched_is_silent() {
    // op1 = 0100 is not in the table.
    let irg = 0b0_0100_0000_0000 << 3;
    let mut builder = TraceBuilder::default();
    builder.cycle(CycleSpec::new(0, irg));
    let (cycles, annots, stats) = run(&config(), &builder.build());
    assert_eq!(cycles[0].mnemonic, None);
    assert!(row(&annots, "instructions").is_empty());
    assert_eq!(row(&annots, "irgword").len(), 1);
    assert_eq!(stats.instructions, 0);
}

#[test]
fn test_display_mode() {
    let mut builder = TraceBuilder::default();
    builder.cycle(CycleSpec::new(0, SET_IDLE).with_mode(Mode::Display));
    let mut samples = builder.build();
    // IDLE rises during S5 and stays high; the mode is already decided.
    for pins in &mut samples[22..] {
        pins.set(Pin::Idle, true);
    }
    let (cycles, annots, _) = run(&config(), &samples);

    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].mode, Some(Mode::Display));
    assert_eq!(texts(&annots, "disp"), ["DISPLAY"]);
    assert!(row(&annots, "calc").is_empty());
    assert!(row(&annots, "warnings").is_empty());
    assert_eq!(cycles[0].mnemonic.as_deref(), Some("SET IDLE"));
}

#[test]
fn test_early_retrigger() {
    let mut builder = TraceBuilder::default();
    builder
        .partial_cycle(CycleSpec::new(0xffff, 0xffff), 6)
        .cycle(CycleSpec::new(0x1234, BRA_1));
    let (cycles, annots, stats) = run(&config(), &builder.build());

    assert_eq!(texts(&annots, "warnings"), ["cycle abandoned at S6"]);
    assert_eq!(spans(&annots, "warnings"), [(2, 26)]);
    assert_eq!(cycles.len(), 1);
    let cycle = &cycles[0];
    assert_eq!(cycle.start, 26);
    assert_eq!(cycle.slots.first().map(|s| s.ordinal), Some(0));
    assert_eq!(cycle.ext(), Some(Word::new(0x1234)));
    assert_eq!(cycle.mnemonic.as_deref(), Some("BRA+ 1"));
    assert_eq!(row(&annots, "extword").len(), 1);
    assert_eq!(row(&annots, "state").len(), 6 + 16);
    assert_eq!(spans(&annots, "timings"), [(0, 2), (2, 26)]);
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.cycles, 1);
}

#[test]
fn test_retrigger_before_first_pulse() {
    let mut builder = TraceBuilder::default();
    builder
        .push(Ti5xPins::default(), 3)
        .idle(1)
        .cycle(CycleSpec::new(0, SET_IDLE));
    let (cycles, annots, _) = run(&config(), &builder.build());
    assert_eq!(texts(&annots, "warnings"), ["cycle abandoned at S0"]);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].start, 6);
}

#[test]
fn test_trace_starting_mid_cycle() {
    let low = Ti5xPins::default();
    let mut samples = vec![low, low, low.with(Pin::Phi1, true), low, low];
    let mut builder = TraceBuilder::default();
    builder.cycle(CycleSpec::new(0x5555, SET_IDLE));
    samples.extend(builder.build());
    let (cycles, annots, stats) = run(&config(), &samples);

    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].start, 7);
    assert_eq!(spans(&annots, "timings"), [(0, 7)]);
    assert!(row(&annots, "errors").is_empty());
    assert!(row(&annots, "warnings").is_empty());
    assert_eq!(stats.overruns, 0);
}

#[test]
fn test_overrun() {
    let pulse = Ti5xPins::default().with(Pin::Idle, true).with(Pin::Phi1, true);
    let mut builder = TraceBuilder::default();
    builder
        .cycle(CycleSpec::new(0, SET_IDLE))
        .push(pulse.with(Pin::Ext, true), 2)
        .idle(2)
        .push(pulse, 2)
        .idle(2)
        .cycle(CycleSpec::new(0, BRA_1));
    let (cycles, annots, stats) = run(&config(), &builder.build());

    assert_eq!(
        texts(&annots, "errors"),
        ["slot S16 out of range", "slot S17 out of range"]
    );
    assert_eq!(spans(&annots, "errors"), [(68, 70), (72, 74)]);
    let ext = row(&annots, "extbits");
    assert_eq!(ext.len(), 34);
    assert_eq!((ext[16].start, ext[16].text.as_str()), (68, "1"));
    assert_eq!(ext[17].text, "0");
    assert_eq!(stats.overruns, 2);

    // Framing continues with the next IDLE edge.
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[1].start, 76);
    assert_eq!(cycles[1].mnemonic.as_deref(), Some("BRA+ 1"));
    assert!(row(&annots, "warnings").is_empty());
}

#[test]
fn test_overrun_ended_by_cycle_start() {
    let pulse = Ti5xPins::default().with(Pin::Idle, true).with(Pin::Phi1, true);
    let mut builder = TraceBuilder::default();
    // PHI1 falls on the same sample IDLE starts the next cycle.
    builder
        .cycle(CycleSpec::new(0, SET_IDLE))
        .push(pulse.with(Pin::Ext, true), 2)
        .cycle(CycleSpec::new(0, BRA_1));
    let (cycles, annots, stats) = run(&config(), &builder.build());

    assert_eq!(texts(&annots, "errors"), ["slot S16 out of range"]);
    assert_eq!(spans(&annots, "errors"), [(68, 70)]);
    let ext = row(&annots, "extbits");
    assert_eq!((ext[16].start, ext[16].text.as_str()), (68, "1"));
    assert_eq!(stats.overruns, 1);
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[1].start, 70);
    assert_eq!(cycles[1].mnemonic.as_deref(), Some("BRA+ 1"));
}

#[test]
fn test_overrun_ended_by_trace_end() {
    let pulse = Ti5xPins::default().with(Pin::Idle, true).with(Pin::Phi1, true);
    let mut builder = TraceBuilder::default();
    builder
        .cycle(CycleSpec::new(0, SET_IDLE))
        .push(pulse.with(Pin::Irg, true), 3);
    let (_, annots, stats) = run(&config(), &builder.build());

    assert_eq!(texts(&annots, "errors"), ["slot S16 out of range"]);
    assert_eq!(spans(&annots, "errors"), [(68, 70)]);
    assert_eq!(texts(&annots, "irgbits")[16], "1");
    assert_eq!(stats.overruns, 1);
    assert!(row(&annots, "warnings").is_empty());
}

#[test]
fn test_finish_at_run_end() {
    let mut builder = TraceBuilder::default();
    builder.partial_cycle(CycleSpec::new(0, 0), 3);
    let samples = builder.build();
    let mut tracker = FrameTracker::new(&config()).unwrap();
    let mut sink = vec![];
    for (n, &pins) in samples.iter().enumerate() {
        tracker.step(Sample::new(n as u64, pins), &mut sink).unwrap();
    }
    let last = samples.len() as u64 - 1;
    let partial = tracker.finish_at(Some(last + 10), &mut sink).unwrap().unwrap();
    assert_eq!(partial.end, last + 10);
    assert_eq!(spans(&sink, "warnings"), [(2, last + 10)]);

    // An end before the last stepped sample is ignored.
    let mut tracker = FrameTracker::new(&config()).unwrap();
    let mut sink = vec![];
    for (n, &pins) in samples.iter().enumerate() {
        tracker.step(Sample::new(n as u64, pins), &mut sink).unwrap();
    }
    tracker.finish_at(Some(0), &mut sink).unwrap();
    assert_eq!(spans(&sink, "warnings"), [(2, last)]);
}

#[test]
fn test_truncated() {
    let mut builder = TraceBuilder::default();
    builder
        .cycle(CycleSpec::new(0, SET_IDLE))
        .partial_cycle(CycleSpec::new(0xffff, 0), 9);
    let samples = builder.build();
    let (cycles, annots, stats) = run(&config(), &samples);

    assert_eq!(cycles.len(), 2);
    let partial = &cycles[1];
    assert!(!partial.is_complete());
    // S8 is still high when the trace ends.
    assert_eq!(partial.slots.len(), 8);
    assert_eq!(partial.ext(), None);
    assert_eq!(partial.mnemonic, None);
    assert_eq!(partial.mode, Some(Mode::Calculate));
    assert_eq!(texts(&annots, "warnings"), ["truncated cycle at S8"]);
    let last = samples.len() as u64 - 1;
    assert_eq!(spans(&annots, "warnings"), [(68, last)]);
    assert_eq!(partial.end, last);
    assert_eq!(row(&annots, "extword").len(), 1);
    assert_eq!(stats.truncated, 1);
    assert_eq!(stats.cycles, 1);
}

#[test]
fn test_finish_when_idle() {
    let mut builder = TraceBuilder::default();
    builder.cycle(CycleSpec::new(0, 0));
    let (cycles, annots, stats) = run(&config(), &builder.build());
    assert_eq!(cycles.len(), 1);
    assert!(row(&annots, "warnings").is_empty());
    assert_eq!(stats.truncated, 0);
}

#[test]
fn test_jitter_confidence() {
    let mut builder = TraceBuilder::new(2, 3);
    builder.cycle(CycleSpec::new(0, SET_IDLE));
    let mut samples = builder.build();
    // Glitch IRG high for one sample in the middle of S4.
    let s4 = 2 + 4 * 5 + 2;
    assert!(samples[s4 + 1].get_phi1());
    samples[s4 + 1].set(Pin::Irg, true);
    let (cycles, annots, _) = run(&config(), &samples);

    let irg = cycles[0].irg().unwrap();
    assert_eq!(irg.value(), SET_IDLE | 1 << 4);
    assert_eq!(irg.stable(), !(1 << 4));
    assert!(!irg.is_stable());
    assert!(cycles[0].ext().unwrap().is_stable());
    assert_eq!(texts(&annots, "irgbits")[4], "1");
}

#[test]
fn test_capture_io() {
    let mut builder = TraceBuilder::default();
    builder.cycle(CycleSpec::new(0, 0).with_io(0xa));
    let samples = builder.build();

    let (_, annots, _) = run(&config(), &samples);
    assert!(row(&annots, "iobits").is_empty());
    assert!(row(&annots, "ioword").is_empty());

    let (cycles, annots, _) = run(&config().with_capture_io(true), &samples);
    assert_eq!(texts(&annots, "iobits"), vec!["A"; 16]);
    assert_eq!(texts(&annots, "ioword"), ["AAAAAAAAAAAAAAAA"]);
    assert_eq!(cycles[0].io(), vec![0xa; 16]);
}

#[test]
fn test_early_revision() {
    let body = 0b0_0000_0001_0101;
    let mut builder = TraceBuilder::default();
    builder.cycle(CycleSpec::new(0, body));
    let samples = builder.build();

    let (cycles, _, _) = run(&config(), &samples);
    assert_ne!(cycles[0].mnemonic.as_deref(), Some("SET IDLE"));

    let early = config().with_revision(crate::word::Revision::Early);
    let (cycles, _, _) = run(&early, &samples);
    assert_eq!(cycles[0].mnemonic.as_deref(), Some("SET IDLE"));
}
