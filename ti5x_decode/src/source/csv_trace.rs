//! sigrok-style CSV traces

use std::io::Read;

use super::{SampleSource, SourceError};
use crate::pins::{Pin, Sample, Ti5xPins};

/// Reads a CSV trace with one sample per record.
///
/// Lines starting with `;` are comments. If the first record contains anything other than `0`
/// and `1` it is taken as a header naming the channels; otherwise the first eight columns are
/// the channels in [`Pin::ALL`] order.
pub struct CsvSource<R> {
    records: csv::StringRecordsIntoIter<R>,
    /// Column of each pin, in `Pin::ALL` order.
    columns: [usize; 8],
    index: u64,
    pending: Option<csv::StringRecord>,
}
impl<R: Read> CsvSource<R> {
    pub fn new(r: R) -> Result<Self, SourceError> {
        let mut records = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b';'))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(r)
            .into_records();
        let mut columns = std::array::from_fn(|n| n);
        let mut pending = records.next().transpose()?;
        if let Some(first) = pending.as_ref().filter(|r| !is_data(r)) {
            columns = header_columns(first)?;
            pending = None;
        }
        Ok(Self {
            records,
            columns,
            index: 0,
            pending,
        })
    }

    fn to_pins(&self, record: &csv::StringRecord) -> Result<Ti5xPins, SourceError> {
        let line = record.position().map_or(0, |p| p.line());
        let mut pins = Ti5xPins::default();
        for (pin, &column) in Pin::ALL.into_iter().zip(&self.columns) {
            let val = match record.get(column) {
                Some("0") => false,
                Some("1") => true,
                Some(other) => {
                    return Err(SourceError::Parse {
                        line,
                        msg: format!("{}: expected 0 or 1, got {other:?}", pin.name()),
                    });
                }
                None => {
                    return Err(SourceError::Parse {
                        line,
                        msg: format!("{}: missing column {column}", pin.name()),
                    });
                }
            };
            pins.set(pin, val);
        }
        Ok(pins)
    }
}

fn is_data(record: &csv::StringRecord) -> bool {
    record.iter().all(|f| f == "0" || f == "1")
}

fn header_columns(header: &csv::StringRecord) -> Result<[usize; 8], SourceError> {
    let line = header.position().map_or(0, |p| p.line());
    let mut columns = [0; 8];
    for (slot, pin) in columns.iter_mut().zip(Pin::ALL) {
        *slot = header
            .iter()
            .position(|name| Pin::from_name(name) == Some(pin))
            .ok_or_else(|| SourceError::Parse {
                line,
                msg: format!("header has no {} column", pin.name()),
            })?;
    }
    Ok(columns)
}

impl<R: Read> SampleSource for CsvSource<R> {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        let record = match self.pending.take() {
            Some(r) => Some(r),
            None => self.records.next().transpose()?,
        };
        let Some(record) = record else {
            return Ok(None);
        };
        let pins = self.to_pins(&record)?;
        let sample = Sample::new(self.index, pins);
        self.index += 1;
        Ok(Some(sample))
    }
}
