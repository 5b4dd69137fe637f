//! Line-oriented trace format
//!
//! ```text
//! # IDLE EXT IRG IO8 IO4 IO2 IO1 PHI1
//! @samplerate 1MHz
//! 10000000 *4
//! 00000000
//! 00000001 *2
//! ```
//!
//! Each vector line holds for the given number of samples (default 1). Directives must precede
//! the first vector.

use std::io::{BufRead, Lines};

use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of, space0, space1},
    combinator::{all_consuming, map_res, opt, recognize, rest},
    multi::count,
    sequence::{pair, preceded, tuple},
};

use super::{SampleSource, SourceError};
use crate::config::parse_hz;
use crate::pins::{Pin, Sample, Ti5xPins};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LstLine {
    Blank,
    SampleRate(u64),
    Vector { pins: Ti5xPins, repeat: u64 },
}

fn directive(s: &str) -> IResult<&str, LstLine> {
    map_res(preceded(pair(tag("@samplerate"), space1), rest), |f: &str| {
        parse_hz(f).map(LstLine::SampleRate)
    })(s)
}

fn vector(s: &str) -> IResult<&str, LstLine> {
    let (s, digits) = recognize(count(one_of("01"), Pin::ALL.len()))(s)?;
    let (s, repeat) = opt(preceded(
        tuple((space0, char('*'), space0)),
        map_res(digit1, |d: &str| d.parse::<u64>()),
    ))(s)?;
    let pins = digits
        .bytes()
        .zip(Pin::ALL)
        .fold(Ti5xPins::default(), |pins, (b, pin)| pins.with(pin, b == b'1'));
    let repeat = repeat.unwrap_or(1);
    Ok((s, LstLine::Vector { pins, repeat }))
}

fn parse_line(line: &str) -> Result<LstLine, String> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(LstLine::Blank);
    }
    let (_, parsed) =
        all_consuming(alt((directive, vector)))(content).map_err(|e| format!("failed to parse: {e}"))?;
    match parsed {
        LstLine::Vector { repeat: 0, .. } => Err("repeat count must be positive".to_string()),
        parsed => Ok(parsed),
    }
}

/// Reads a `.lst` trace.
pub struct LstSource<R> {
    lines: Lines<R>,
    line: u64,
    index: u64,
    samplerate: Option<u64>,
    pending: Option<(Ti5xPins, u64)>,
}
impl<R: BufRead> LstSource<R> {
    /// Reads leading directives, up to the first vector.
    pub fn new(r: R) -> Result<Self, SourceError> {
        let mut this = Self {
            lines: r.lines(),
            line: 0,
            index: 0,
            samplerate: None,
            pending: None,
        };
        this.pending = this.next_vector(true)?;
        Ok(this)
    }

    fn next_vector(&mut self, header: bool) -> Result<Option<(Ti5xPins, u64)>, SourceError> {
        while let Some(text) = self.lines.next().transpose()? {
            self.line += 1;
            let parsed = parse_line(&text).map_err(|msg| SourceError::Parse {
                line: self.line,
                msg,
            })?;
            match parsed {
                LstLine::Blank => (),
                LstLine::SampleRate(rate) if header => self.samplerate = Some(rate),
                LstLine::SampleRate(_) => {
                    return Err(SourceError::Parse {
                        line: self.line,
                        msg: "directive after first vector".to_string(),
                    });
                }
                LstLine::Vector { pins, repeat } => return Ok(Some((pins, repeat))),
            }
        }
        Ok(None)
    }
}
impl<R: BufRead> SampleSource for LstSource<R> {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        let next = match self.pending.take() {
            Some(v) => Some(v),
            None => self.next_vector(false)?,
        };
        let Some((pins, repeat)) = next else {
            return Ok(None);
        };
        let sample = Sample::new(self.index, pins);
        self.index = self
            .index
            .checked_add(repeat)
            .ok_or_else(|| SourceError::Parse {
                line: self.line,
                msg: "sample index overflow".to_string(),
            })?;
        Ok(Some(sample))
    }

    fn samplerate(&self) -> Option<u64> {
        self.samplerate
    }

    /// The last vector holds until just before the next index.
    fn last_index(&self) -> Option<u64> {
        self.index.checked_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn read_all(text: &str) -> Result<(Option<u64>, Vec<Sample>), SourceError> {
        let mut source = LstSource::new(text.as_bytes())?;
        let mut samples = vec![];
        while let Some(sample) = source.next_sample()? {
            samples.push(sample);
        }
        Ok((source.samplerate(), samples))
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("  # comment"), Ok(LstLine::Blank));
        assert_eq!(parse_line("@samplerate 2MHz"), Ok(LstLine::SampleRate(2_000_000)));
        assert_eq!(
            parse_line("10000001 * 12 # S0"),
            Ok(LstLine::Vector {
                pins: Ti5xPins(0x81),
                repeat: 12
            })
        );
        assert!(parse_line("1000000").is_err());
        assert!(parse_line("100000012").is_err());
        assert!(parse_line("10000001 *0").is_err());
        assert!(parse_line("@samplerate soon").is_err());
    }

    #[test]
    fn test_read() {
        let text = "\
# IDLE EXT IRG IO8 IO4 IO2 IO1 PHI1
@samplerate 500kHz

10000000 *4
00000000
01100001*2
";
        let (rate, samples) = read_all(text).unwrap();
        assert_eq!(rate, Some(500_000));
        assert_eq!(
            samples,
            vec![
                Sample::new(0, Ti5xPins(0x01)),
                Sample::new(4, Ti5xPins(0x00)),
                Sample::new(5, Ti5xPins(0x86)),
            ]
        );
    }

    #[test]
    fn test_last_index() {
        let mut source = LstSource::new("10000000 *4\n00000001 *3\n".as_bytes()).unwrap();
        assert_eq!(source.last_index(), None);
        while source.next_sample().unwrap().is_some() {}
        assert_eq!(source.last_index(), Some(6));
    }

    #[test]
    fn test_index_overflow() {
        let text = "10000000 *18446744073709551615\n00000000 *2\n10000000\n";
        let err = read_all(text).unwrap_err();
        assert_matches!(err, SourceError::Parse { line: 2, msg } if msg.contains("overflow"));

        // A run may end exactly at the last index.
        let (_, samples) = read_all("10000000 *18446744073709551615\n").unwrap();
        assert_eq!(samples, vec![Sample::new(0, Ti5xPins(0x01))]);
    }

    #[test]
    fn test_late_directive() {
        let err = read_all("10000000\n@samplerate 1MHz\n").unwrap_err();
        assert_matches!(err, SourceError::Parse { line: 2, .. });
    }

    #[test]
    fn test_parse_error_line() {
        let err = read_all("10000000\n\n1x000000\n").unwrap_err();
        assert_matches!(err, SourceError::Parse { line: 3, .. });
    }
}
