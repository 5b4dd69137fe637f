// Synthetic trace generator

use std::io::Write;

use clap::Parser;
use color_eyre::{Result, eyre};
use ti5x_decode::{
    synth::{CycleSpec, TraceBuilder},
    timing::Mode,
};

use crate::cli::{parse_hz, parse_word};

#[derive(Parser, Debug)]
pub struct SynthArgs {
    /// IRG word of a cycle. May be provided multiple times, one cycle each.
    #[arg(long, required = true, value_parser=parse_word)]
    irg: Vec<u16>,

    /// EXT word of every cycle.
    #[arg(long, default_value = "0", value_parser=parse_word)]
    ext: u16,

    /// Generate display cycles (IDLE held low) instead of calculate cycles.
    #[arg(long)]
    display: bool,

    /// Samples per PHI1 high phase.
    #[arg(long, default_value_t = 2)]
    high: usize,

    /// Samples per PHI1 low phase.
    #[arg(long, default_value_t = 2)]
    low: usize,

    /// Sample rate to declare in the trace.
    #[arg(long, value_parser=parse_hz)]
    samplerate: Option<u64>,
}

pub fn run(args: SynthArgs) -> Result<()> {
    if args.high == 0 || args.low == 0 {
        eyre::bail!("--high and --low must be at least 1");
    }
    let mode = if args.display {
        Mode::Display
    } else {
        Mode::Calculate
    };

    let mut builder = TraceBuilder::new(args.low, args.high);
    for irg in args.irg {
        builder.cycle(CycleSpec::new(args.ext, irg).with_mode(mode));
    }

    let mut out = std::io::stdout().lock();
    builder.write_lst(&mut out, args.samplerate)?;
    out.flush()?;
    Ok(())
}
