// Trace decoder

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::PathBuf,
};

use clap::Parser;
use color_eyre::{Result, eyre::WrapErr};
use ti5x_decode::{
    annotation::{Format, WriterSink},
    config::DecoderConfig,
    decoder,
    source::{CsvSource, LstSource},
    word::Revision,
};

use crate::cli::parse_hz;

#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Trace to decode.
    ///
    /// Files ending in `.csv` are read as sigrok-cli CSV exports. Anything else is read as a
    /// `.lst` vector list.
    #[arg()]
    trace: PathBuf,

    /// Sample rate of the trace, e.g. `1MHz`. Overrides an `@samplerate` directive.
    #[arg(long, value_parser=parse_hz)]
    samplerate: Option<u64>,

    /// Framing of the IRG word.
    #[arg(long, value_enum, default_value_t)]
    revision: Revision,

    /// Annotate the IO8..IO1 nibble of every slot.
    #[arg(long)]
    io: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t)]
    format: Format,

    /// Write annotations to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: DecodeArgs) -> Result<()> {
    let config = DecoderConfig {
        samplerate: args.samplerate,
        revision: args.revision,
        capture_io: args.io,
    };

    let file = File::open(&args.trace)
        .wrap_err_with(|| format!("failed to open {}", args.trace.display()))?;
    let reader = BufReader::new(file);

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).wrap_err_with(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut sink = WriterSink::new(args.format, out);

    let is_csv = args
        .trace
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let summary = if is_csv {
        decoder::run(&config, CsvSource::new(reader)?, &mut sink)?
    } else {
        decoder::run(&config, LstSource::new(reader)?, &mut sink)?
    };

    if summary.cycles == 0 {
        eprintln!("no instruction cycles found in {} samples", summary.samples);
    }
    Ok(())
}
