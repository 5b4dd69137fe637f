//! Sample sources

use crate::pins::{Sample, Ti5xPins};

mod csv_trace;
mod lst;

pub use csv_trace::CsvSource;
pub use lst::LstSource;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("read trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("read trace: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {msg}")]
    Parse { line: u64, msg: String },
    #[error("sample index {index} does not follow {prev}")]
    NonMonotonic { prev: u64, index: u64 },
}

/// A pull-based stream of samples. `Ok(None)` marks the end of the trace.
pub trait SampleSource {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError>;

    /// Samplerate declared by the trace itself, if any.
    fn samplerate(&self) -> Option<u64> {
        None
    }

    /// Index of the last sample covered so far, when it can lie beyond the last sample returned.
    fn last_index(&self) -> Option<u64> {
        None
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        (**self).next_sample()
    }

    fn samplerate(&self) -> Option<u64> {
        (**self).samplerate()
    }

    fn last_index(&self) -> Option<u64> {
        (**self).last_index()
    }
}

/// Numbers pin vectors from an iterator consecutively, starting at zero.
pub struct IterSource<I> {
    iter: I,
    index: u64,
}
impl<I: Iterator<Item = Ti5xPins>> IterSource<I> {
    pub fn new(iter: I) -> Self {
        Self { iter, index: 0 }
    }
}
impl<I: Iterator<Item = Ti5xPins>> SampleSource for IterSource<I> {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        Ok(self.iter.next().map(|pins| {
            let sample = Sample::new(self.index, pins);
            self.index += 1;
            sample
        }))
    }
}
