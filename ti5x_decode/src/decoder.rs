//! Decoding driver: pulls samples from a source through the frame tracker into a sink.

use tracing::info;

use crate::annotation::{AnnotationSink, SinkError};
use crate::config::{ConfigError, DecoderConfig};
use crate::pins::Sample;
use crate::source::{SampleSource, SourceError};
use crate::tracker::FrameTracker;
use crate::word::InstructionCycle;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("write annotations: {0}")]
    Sink(#[from] SinkError),
}

/// Counters for a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub samples: u64,
    pub cycles: u64,
    pub abandoned: u64,
    pub truncated: u64,
    pub overruns: u64,
    pub instructions: u64,
}

pub struct Decoder {
    tracker: FrameTracker,
    samples: u64,
    last_index: Option<u64>,
}
impl Decoder {
    pub fn new(config: &DecoderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tracker: FrameTracker::new(config)?,
            samples: 0,
            last_index: None,
        })
    }

    /// Feeds one sample. Sample indices must be strictly increasing.
    pub fn process(
        &mut self,
        sample: Sample,
        sink: &mut impl AnnotationSink,
    ) -> Result<Option<InstructionCycle>, DecodeError> {
        if let Some(prev) = self.last_index.filter(|&prev| sample.index <= prev) {
            return Err(SourceError::NonMonotonic {
                prev,
                index: sample.index,
            }
            .into());
        }
        self.last_index = Some(sample.index);
        self.samples += 1;
        Ok(self.tracker.step(sample, sink)?)
    }

    /// Ends the run, flushing any cycle still in progress. `end` is the last sample index of the
    /// trace, when it lies beyond the last sample processed.
    pub fn finish(
        mut self,
        end: Option<u64>,
        sink: &mut impl AnnotationSink,
    ) -> Result<(Summary, Option<InstructionCycle>), DecodeError> {
        let partial = self.tracker.finish_at(end, sink)?;
        sink.flush()?;
        let stats = self.tracker.stats();
        let summary = Summary {
            samples: self.samples,
            cycles: stats.cycles,
            abandoned: stats.abandoned,
            truncated: stats.truncated,
            overruns: stats.overruns,
            instructions: stats.instructions,
        };
        Ok((summary, partial))
    }
}

/// Decodes a whole trace. A samplerate missing from `config` is taken from the source; the
/// configuration is validated before the first sample is read.
pub fn run(
    config: &DecoderConfig,
    mut source: impl SampleSource,
    sink: &mut impl AnnotationSink,
) -> Result<Summary, DecodeError> {
    let config = DecoderConfig {
        samplerate: config.samplerate.or_else(|| source.samplerate()),
        ..*config
    };
    let mut decoder = Decoder::new(&config)?;
    while let Some(sample) = source.next_sample()? {
        decoder.process(sample, sink)?;
    }
    let (summary, _) = decoder.finish(source.last_index(), sink)?;
    info!(
        samples = summary.samples,
        cycles = summary.cycles,
        instructions = summary.instructions,
        abandoned = summary.abandoned,
        truncated = summary.truncated,
        overruns = summary.overruns,
        "decode complete"
    );
    Ok(summary)
}
