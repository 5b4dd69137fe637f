//! Annotations and annotation sinks

use std::io::Write;

use serde::Serialize;

use crate::timing::Mode;
use crate::word::Line;

/// What an annotation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Start of a bit slot.
    StateMarker,
    /// One bit (or IO nibble) sampled during a slot.
    RawBit(Line),
    /// An assembled 16-bit word.
    WordValue(Line),
    /// Operating mode of a cycle.
    ModeSpan(Mode),
    /// Time since the previous cycle start.
    CycleTiming,
    Instruction,
    Warning,
    Error,
}
impl Category {
    /// Annotation row name.
    pub fn row(self) -> &'static str {
        match self {
            Category::StateMarker => "state",
            Category::RawBit(Line::Ext) => "extbits",
            Category::RawBit(Line::Irg) => "irgbits",
            Category::RawBit(Line::Io) => "iobits",
            Category::WordValue(Line::Ext) => "extword",
            Category::WordValue(Line::Irg) => "irgword",
            Category::WordValue(Line::Io) => "ioword",
            Category::ModeSpan(Mode::Calculate) => "calc",
            Category::ModeSpan(Mode::Display) => "disp",
            Category::CycleTiming => "timings",
            Category::Instruction => "instructions",
            Category::Warning => "warnings",
            Category::Error => "errors",
        }
    }
}

/// A labelled span of samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub start: u64,
    pub end: u64,
    pub category: Category,
    pub text: String,
}
impl Annotation {
    pub fn new(start: u64, end: u64, category: Category, text: impl Into<String>) -> Self {
        debug_assert!(start <= end);
        Self {
            start,
            end,
            category,
            text: text.into(),
        }
    }
}

/// Flat form of an annotation, for serialization.
#[derive(Debug, Serialize)]
struct RawAnnotation<'a> {
    start: u64,
    end: u64,
    row: &'static str,
    text: &'a str,
}
impl<'a> From<&'a Annotation> for RawAnnotation<'a> {
    fn from(ann: &'a Annotation) -> Self {
        Self {
            start: ann.start,
            end: ann.end,
            row: ann.category.row(),
            text: &ann.text,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("write annotation: {0}")]
    Io(#[from] std::io::Error),
    #[error("write annotation: {0}")]
    Csv(#[from] csv::Error),
    #[error("write annotation: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only destination for annotations.
pub trait AnnotationSink {
    fn push(&mut self, annotation: Annotation) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl AnnotationSink for Vec<Annotation> {
    fn push(&mut self, annotation: Annotation) -> Result<(), SinkError> {
        Vec::push(self, annotation);
        Ok(())
    }
}

/// Output format for annotation writers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// `<start>-<end> <row>: <text>`
    #[default]
    Text,
    /// Headerless `start,end,row,text` records.
    Csv,
    /// One JSON object per line.
    Json,
}

/// Writes annotations to a byte stream.
pub struct WriterSink<W: Write> {
    inner: Inner<W>,
}
enum Inner<W: Write> {
    Text(W),
    Csv(csv::Writer<W>),
    Json(W),
}
impl<W: Write> WriterSink<W> {
    pub fn new(format: Format, w: W) -> Self {
        let inner = match format {
            Format::Text => Inner::Text(w),
            Format::Csv => Inner::Csv(csv::WriterBuilder::new().has_headers(false).from_writer(w)),
            Format::Json => Inner::Json(w),
        };
        Self { inner }
    }
}
impl<W: Write> AnnotationSink for WriterSink<W> {
    fn push(&mut self, annotation: Annotation) -> Result<(), SinkError> {
        let raw = RawAnnotation::from(&annotation);
        match &mut self.inner {
            Inner::Text(w) => writeln!(w, "{}-{} {}: {}", raw.start, raw.end, raw.row, raw.text)?,
            Inner::Csv(w) => w.serialize(raw)?,
            Inner::Json(w) => {
                serde_json::to_writer(&mut *w, &raw)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        match &mut self.inner {
            Inner::Text(w) | Inner::Json(w) => w.flush()?,
            Inner::Csv(w) => w.flush()?,
        }
        Ok(())
    }
}
