//! Command definitions

use clap::{Parser, Subcommand};
use color_eyre::Result;

mod decode;
mod dis;
mod synth;

use decode::DecodeArgs;
use dis::DisArgs;
use synth::SynthArgs;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}
impl Cli {
    pub fn run(self) -> Result<()> {
        self.command.run()
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode a bus trace
    Decode(DecodeArgs),
    /// Instruction decoder
    Dis(DisArgs),
    /// Synthetic trace generator
    Synth(SynthArgs),
}
impl Command {
    pub fn run(self) -> Result<()> {
        match self {
            Command::Decode(args) => decode::run(args),
            Command::Dis(args) => dis::run(args),
            Command::Synth(args) => synth::run(args),
        }
    }
}

/// Parses a frequency value.
fn parse_hz(s: &str) -> Result<u64> {
    Ok(ti5x_decode::config::parse_hz(s)?)
}

/// Parses a 16-bit word: `0x` hex, `0b` binary, or decimal. Underscores are ignored.
fn parse_word(s: &str) -> Result<u16> {
    let lower = s.to_lowercase().replace('_', "");
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        u16::from_str_radix(hex, 16)?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u16::from_str_radix(bin, 2)?
    } else {
        lower.parse::<u16>()?
    };
    Ok(value)
}
