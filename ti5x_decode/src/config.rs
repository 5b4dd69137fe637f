//! Decoder configuration

use std::sync::LazyLock;

use regex::Regex;

use crate::word::Revision;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cannot decode without samplerate")]
    MissingSampleRate,
    #[error("samplerate must be positive")]
    ZeroSampleRate,
    #[error("invalid frequency {0:?}: must match [0-9.]+[kmg]?(hz)? (case insensitive)")]
    InvalidFrequency(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct DecoderConfig {
    /// Samples per second.
    pub samplerate: Option<u64>,
    pub revision: Revision,
    /// Annotate the IO8..IO1 nibble of every slot.
    pub capture_io: bool,
}
impl DecoderConfig {
    pub fn with_samplerate(mut self, samplerate: u64) -> Self {
        self.samplerate = Some(samplerate);
        self
    }

    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_capture_io(mut self, capture_io: bool) -> Self {
        self.capture_io = capture_io;
        self
    }

    /// Checks the configuration, returning the samplerate.
    pub fn validate(&self) -> Result<u64, ConfigError> {
        match self.samplerate {
            None => Err(ConfigError::MissingSampleRate),
            Some(0) => Err(ConfigError::ZeroSampleRate),
            Some(rate) => Ok(rate),
        }
    }
}

/// Parses a frequency such as `500kHz`, `1M` or `2.5mhz`.
pub fn parse_hz(s: &str) -> Result<u64, ConfigError> {
    static REGEX: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^([0-9]+(?:\.[0-9]+)?)\s*([kmg])?(hz)?$").unwrap());
    let invalid = || ConfigError::InvalidFrequency(s.to_string());
    let lower = s.trim().to_lowercase();
    let cap = REGEX.captures(&lower).ok_or_else(invalid)?;
    let base: f64 = cap[1].parse().map_err(|_| invalid())?;
    let factor = match cap.get(2).map(|m| m.as_str()) {
        None => 1.,
        Some("k") => 1e3,
        Some("m") => 1e6,
        Some("g") => 1e9,
        Some(_) => unreachable!(),
    };
    let value = (base * factor).round() as u64;
    if value == 0 {
        return Err(ConfigError::ZeroSampleRate);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_validate() {
        let config = DecoderConfig::default();
        assert_matches!(config.validate(), Err(ConfigError::MissingSampleRate));
        let config = config.with_samplerate(0);
        assert_matches!(config.validate(), Err(ConfigError::ZeroSampleRate));
        let config = config.with_samplerate(1_000_000);
        assert_matches!(config.validate(), Ok(1_000_000));
    }

    #[test]
    fn test_parse_hz() {
        assert_eq!(parse_hz("1000"), Ok(1000));
        assert_eq!(parse_hz("500kHz"), Ok(500_000));
        assert_eq!(parse_hz("1M"), Ok(1_000_000));
        assert_eq!(parse_hz("2.5mhz"), Ok(2_500_000));
        assert_eq!(parse_hz("1 MHz"), Ok(1_000_000));
        assert_eq!(parse_hz("0"), Err(ConfigError::ZeroSampleRate));
        assert_matches!(parse_hz("fast"), Err(ConfigError::InvalidFrequency(_)));
        assert_matches!(parse_hz("1.2.3k"), Err(ConfigError::InvalidFrequency(_)));
    }
}
