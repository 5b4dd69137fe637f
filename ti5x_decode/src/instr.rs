//! TI-5x instruction decoding
//!
//! An instruction body is 13 bits wide:
//!
//! ```text
//!  12 | 11 10 9 8 | 7 6 5 4 | 3 2 1 0
//!   B |    op1    |   op2   |   op3
//! ```
//!
//! When `B` is set the body is a branch: bits 10..1 hold the offset magnitude and bit 0 the
//! direction (0 forward, 1 backward). Bit 11 is not decoded.
//!
//! Everything else is matched against [`RULES`]. Every rule is evaluated and the last match
//! wins, so a narrow rule listed after a broad one overrides it.
//!
//! Mnemonics carry the field values themselves: the `SET KR(n)` form for op2 = 3 renders as
//! `SET KR(3)`, and `ADD A,#k` with op3 = 7 as `ADD A,#7`.

use std::fmt::Display;

use crate::bits;
use crate::word::{BODY_BITS, Revision, Word};


const BODY_MASK: u16 = (1 << BODY_BITS) - 1;

/// The three nibbles of an instruction body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    pub branch: bool,
    pub op1: u8,
    pub op2: u8,
    pub op3: u8,
}
impl Fields {
    pub fn from_body(body: u16) -> Self {
        Self {
            branch: bits::field(body, 12, 1) == 1,
            op1: bits::nibble(body, 8),
            op2: bits::nibble(body, 4),
            op3: bits::nibble(body, 0),
        }
    }
}
impl Display for Fields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:04b} {:04b} {:04b}",
            self.branch as u8, self.op1, self.op2, self.op3
        )
    }
}

/// A bit pattern over an instruction body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    mask: u16,
    value: u16,
}
impl Pattern {
    /// Parses a pattern of `0`, `1` and `x` (don't care), most significant bit first. Spaces and
    /// underscores are ignored.
    pub const fn parse(s: &str) -> Self {
        let bytes = s.as_bytes();
        let mut mask = 0u16;
        let mut value = 0u16;
        let mut width = 0;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b' ' | b'_' => (),
                b'0' => {
                    mask = mask << 1 | 1;
                    value <<= 1;
                    width += 1;
                }
                b'1' => {
                    mask = mask << 1 | 1;
                    value = value << 1 | 1;
                    width += 1;
                }
                b'x' => {
                    mask <<= 1;
                    value <<= 1;
                    width += 1;
                }
                _ => panic!("invalid pattern character"),
            }
            i += 1;
        }
        assert!(width == BODY_BITS, "pattern must be 13 bits wide");
        Self { mask, value }
    }

    pub fn matches(self, body: u16) -> bool {
        body & self.mask == self.value
    }

    /// Lowest body matching the pattern.
    pub fn lowest(self) -> u16 {
        self.value
    }

    /// Whether some body matches both patterns.
    pub fn overlaps(self, other: Pattern) -> bool {
        (self.value ^ other.value) & self.mask & other.mask == 0
    }
}

/// One entry of the mnemonic table.
pub struct Rule {
    pub text: &'static str,
    pub pattern: Pattern,
    render: fn(Fields) -> String,
}
impl Rule {
    const fn new(text: &'static str, render: fn(Fields) -> String) -> Self {
        Self {
            text,
            pattern: Pattern::parse(text),
            render,
        }
    }

    pub fn render(&self, fields: Fields) -> String {
        (self.render)(fields)
    }
}

fn branch(f: Fields) -> String {
    let body = u16::from(f.op1) << 8 | u16::from(f.op2) << 4 | u16::from(f.op3);
    let magnitude = bits::field(body, 1, 10);
    let polarity = if body & 1 == 0 { '+' } else { '-' };
    format!("BRA{polarity} {magnitude}")
}

fn register(f: Fields) -> String {
    let reg = f.op2 & 0x7;
    if f.op2 & 0x8 == 0 {
        format!("WR R({reg})")
    } else {
        format!("RD R({reg})")
    }
}

/// The mnemonic table, in evaluation order.
pub const RULES: &[Rule] = &[
    Rule::new("1 xxxx xxxx xxxx", branch),
    // Flag A/B bit operations; op2 addresses the flag bit.
    Rule::new("0 0000 xxxx 0000", |f| format!("TST FA({})", f.op2)),
    Rule::new("0 0000 xxxx 0001", |f| format!("SET FA({})", f.op2)),
    Rule::new("0 0000 xxxx 0010", |f| format!("CLR FA({})", f.op2)),
    Rule::new("0 0000 xxxx 0011", |f| format!("INV FA({})", f.op2)),
    Rule::new("0 0000 xxxx 0100", |f| format!("XCH FA({0}),FB({0})", f.op2)),
    Rule::new("0 0000 xxxx 0101", |f| format!("SET KR({})", f.op2)),
    Rule::new("0 0000 xxxx 0110", |f| format!("MOV FA({0}),FB({0})", f.op2)),
    Rule::new("0 0000 xxxx 0111", |f| format!("CMP FA({0}),FB({0})", f.op2)),
    Rule::new("0 0000 xxxx 1000", |f| format!("TST FB({})", f.op2)),
    Rule::new("0 0000 xxxx 1001", |f| format!("SET FB({})", f.op2)),
    Rule::new("0 0000 xxxx 1010", |f| format!("CLR FB({})", f.op2)),
    Rule::new("0 0000 xxxx 1011", |f| format!("INV FB({})", f.op2)),
    Rule::new("0 0000 xxxx 1100", |f| format!("MOV FB({0}),FA({0})", f.op2)),
    Rule::new("0 0000 xxxx 1101", |f| format!("TST KR({})", f.op2)),
    // KR bit 1 doubles as the idle/busy latch.
    Rule::new("0 0000 0001 0101", |_| "SET IDLE".to_string()),
    Rule::new("0 0000 0001 1101", |_| "TST BUSY".to_string()),
    // Keyboard register transfers.
    Rule::new("0 0000 0000 1110", |_| "MOV A,KR".to_string()),
    Rule::new("0 0000 0001 1110", |_| "MOV KR,A".to_string()),
    Rule::new("0 0000 0010 1110", |_| "XCH A,KR".to_string()),
    Rule::new("0 0000 0011 1110", |_| "CLR KR".to_string()),
    // Peripheral strobes, refined below for the card reader and printer.
    Rule::new("0 0000 xxxx 1111", |f| format!("IO({})", f.op2)),
    Rule::new("0 0000 0000 1111", |_| "CRD READ".to_string()),
    Rule::new("0 0000 0001 1111", |_| "CRD WRITE".to_string()),
    Rule::new("0 0000 0010 1111", |_| "CRD OFF".to_string()),
    Rule::new("0 0000 0100 1111", |_| "PRT CLEAR".to_string()),
    Rule::new("0 0000 0101 1111", |_| "PRT STEP".to_string()),
    Rule::new("0 0000 0110 1111", |_| "PRT PRINT".to_string()),
    Rule::new("0 0000 0111 1111", |_| "PRT FEED".to_string()),
    Rule::new("0 0000 1000 1111", |_| "IDLE".to_string()),
    Rule::new("0 0000 1001 1111", |_| "BUSY".to_string()),
    // Register file: op2 bit 3 selects read, bits 2..0 the register.
    Rule::new("0 0001 xxxx 0000", register),
    Rule::new("0 0001 xxxx 0001", |f| format!("XCH A,R({})", f.op2 & 0x7)),
    // ALU immediate forms; op3 is the constant.
    Rule::new("0 0010 0000 xxxx", |f| format!("ADD A,#{}", f.op3)),
    Rule::new("0 0010 0001 xxxx", |f| format!("ADD B,#{}", f.op3)),
    Rule::new("0 0011 0000 xxxx", |f| format!("SUB A,#{}", f.op3)),
    Rule::new("0 0011 0001 xxxx", |f| format!("SUB B,#{}", f.op3)),
];

/// Decodes an instruction body into a mnemonic. Returns `None` when no rule matches.
pub fn decode(body: u16) -> Option<String> {
    let body = body & BODY_MASK;
    let fields = Fields::from_body(body);
    RULES
        .iter()
        .fold(None, |found, rule| {
            if rule.pattern.matches(body) {
                Some(rule)
            } else {
                found
            }
        })
        .map(|rule| rule.render(fields))
}

/// Decodes the IRG word of a complete cycle.
pub fn decode_word(irg: Word, revision: Revision) -> Option<String> {
    decode(irg.instruction_body(revision))
}

/// Index pairs of rules that can match the same body, in table order.
pub fn overlapping_rules() -> Vec<(usize, usize)> {
    let mut pairs = vec![];
    for (i, a) in RULES.iter().enumerate() {
        for (j, b) in RULES.iter().enumerate().skip(i + 1) {
            if a.pattern.overlaps(b.pattern) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}
