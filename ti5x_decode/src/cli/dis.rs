// Instruction decoder

use clap::Parser;
use color_eyre::{Result, eyre};
use ti5x_decode::{
    instr::{self, Fields, RULES},
    word::{BODY_BITS, Revision, Word},
};

use crate::cli::parse_word;

#[derive(Parser, Debug)]
pub struct DisArgs {
    /// Instruction bodies to decode, as `0x` hex, `0b` binary or decimal.
    #[arg(value_parser=parse_word, required_unless_present="table")]
    words: Vec<u16>,

    /// Treat the words as 16-bit IRG words, framing slots included.
    #[arg(long)]
    raw: bool,

    /// Framing of the IRG word, used with --raw.
    #[arg(long, value_enum, default_value_t)]
    revision: Revision,

    /// Print the rule table and the rules that overlap.
    #[arg(long)]
    table: bool,
}

pub fn run(args: DisArgs) -> Result<()> {
    if args.table {
        print_table();
    }

    for word in args.words {
        let body = if args.raw {
            Word::new(word).instruction_body(args.revision)
        } else if word >> BODY_BITS != 0 {
            eyre::bail!("{word:#06x} is wider than an instruction body; use --raw for IRG words");
        } else {
            word
        };
        let mnemonic = instr::decode(body);
        println!(
            "{word:#06x}  {}  {}",
            Fields::from_body(body),
            mnemonic.as_deref().unwrap_or("??")
        );
    }
    Ok(())
}

fn print_table() {
    for (n, rule) in RULES.iter().enumerate() {
        let example = rule.render(Fields::from_body(rule.pattern.lowest()));
        println!("{n:>2}  {}  {example}", rule.text);
    }
    let overlaps = instr::overlapping_rules();
    if !overlaps.is_empty() {
        println!();
        println!("overlapping rules (later wins):");
    }
    for (a, b) in overlaps {
        println!("{a:>2} {}  <  {b:>2} {}", RULES[a].text, RULES[b].text);
    }
}
