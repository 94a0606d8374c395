//! Line-oriented tokenizer for the Prometheus text exposition format
//!
//! Each sample line has the shape
//!
//! ```text
//! metric_name[{label="value",...}] value [timestamp]
//! ```
//!
//! Blank lines and `#` comment lines (`# HELP`, `# TYPE`) carry no samples.
//! Malformed lines are skipped by [`samples`]; [`parse_line`] reports why.

use crate::models::TemperatureSamples;
use thiserror::Error;
use tracing::trace;

/// Metric name node_exporter uses for hwmon temperature sensors
pub const HWMON_TEMPERATURE: &str = "node_hwmon_temp_celsius";

/// Why a line could not be tokenized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpositionError {
    #[error("column {0}: expected metric name")]
    MissingName(usize),
    #[error("column {0}: expected label name")]
    MissingLabelName(usize),
    #[error("column {0}: expected '=' after label name")]
    MissingEquals(usize),
    #[error("column {0}: expected '\"' to open label value")]
    MissingQuote(usize),
    #[error("column {0}: unterminated label value")]
    UnterminatedValue(usize),
    #[error("column {0}: expected ',' or '}}' in label set")]
    UnterminatedLabels(usize),
    #[error("column {0}: expected sample value")]
    MissingValue(usize),
    #[error("column {0}: unexpected trailing content")]
    TrailingContent(usize),
}

/// One tokenized sample line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample<'a> {
    pub name: &'a str,
    /// `None` when the line has no `{...}` section at all
    pub labels: Option<Vec<(&'a str, String)>>,
    pub value: &'a str,
    pub timestamp: Option<&'a str>,
    /// Source text from the start of the metric name through the end of the value
    pub text: &'a str,
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_blanks(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn take_while(&mut self, pred: impl Fn(u8, bool) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !pred(b, self.pos == start) {
                break;
            }
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn take_token(&mut self) -> &'a str {
        self.take_while(|b, _| !matches!(b, b' ' | b'\t'))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }
}

fn is_metric_name_char(b: u8, first: bool) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || (!first && b.is_ascii_digit())
}

fn is_label_name_char(b: u8, first: bool) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || (!first && b.is_ascii_digit())
}

fn parse_label_value(cur: &mut Cursor<'_>) -> Result<String, ExpositionError> {
    let open = cur.pos;
    if !cur.eat(b'"') {
        return Err(ExpositionError::MissingQuote(open));
    }

    let src = cur.src;
    let mut value = String::new();
    let mut chars = src[cur.pos..].char_indices();
    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => {
                cur.pos += offset + 1;
                return Ok(value);
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            c => value.push(c),
        }
    }

    Err(ExpositionError::UnterminatedValue(open))
}

fn parse_labels<'a>(cur: &mut Cursor<'a>) -> Result<Vec<(&'a str, String)>, ExpositionError> {
    let mut labels = Vec::new();
    loop {
        cur.skip_blanks();
        if cur.eat(b'}') {
            return Ok(labels);
        }

        let name = cur.take_while(is_label_name_char);
        if name.is_empty() {
            return Err(ExpositionError::MissingLabelName(cur.pos));
        }
        cur.skip_blanks();
        if !cur.eat(b'=') {
            return Err(ExpositionError::MissingEquals(cur.pos));
        }
        cur.skip_blanks();
        let value = parse_label_value(cur)?;
        labels.push((name, value));

        cur.skip_blanks();
        if cur.eat(b',') {
            continue;
        }
        if cur.eat(b'}') {
            return Ok(labels);
        }
        return Err(ExpositionError::UnterminatedLabels(cur.pos));
    }
}

/// Tokenize one line; `Ok(None)` for blank and comment lines
pub fn parse_line(line: &str) -> Result<Option<Sample<'_>>, ExpositionError> {
    let line = line.trim_end_matches('\r');
    let mut cur = Cursor::new(line);
    cur.skip_blanks();
    if cur.at_end() || cur.peek() == Some(b'#') {
        return Ok(None);
    }

    let start = cur.pos;
    let name = cur.take_while(is_metric_name_char);
    if name.is_empty() {
        return Err(ExpositionError::MissingName(start));
    }

    let labels = if cur.eat(b'{') {
        Some(parse_labels(&mut cur)?)
    } else {
        None
    };

    if cur.skip_blanks() == 0 {
        return Err(ExpositionError::MissingValue(cur.pos));
    }
    let value = cur.take_token();
    if value.is_empty() {
        return Err(ExpositionError::MissingValue(cur.pos));
    }
    let text = &line[start..cur.pos];

    cur.skip_blanks();
    let timestamp = if cur.at_end() {
        None
    } else {
        Some(cur.take_token())
    };
    cur.skip_blanks();
    if !cur.at_end() {
        return Err(ExpositionError::TrailingContent(cur.pos));
    }

    Ok(Some(Sample {
        name,
        labels,
        value,
        timestamp,
        text,
    }))
}

/// Iterate over every well-formed sample in a payload
pub fn samples(body: &str) -> impl Iterator<Item = Sample<'_>> {
    body.lines()
        .enumerate()
        .filter_map(|(index, line)| match parse_line(line) {
            Ok(sample) => sample,
            Err(e) => {
                trace!(line = index + 1, error = %e, "Skipping malformed exposition line");
                None
            }
        })
}

/// `digits '.' digits`, the only reading shape accepted for temperatures
fn is_decimal_reading(value: &str) -> bool {
    match value.split_once('.') {
        Some((int, frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Extract hwmon temperature readings keyed by their sample text
///
/// Only labeled `node_hwmon_temp_celsius` samples whose value is a plain
/// decimal reading are kept. An empty map means the node exposes no
/// temperature sensors.
pub fn temperature_samples(body: &str) -> TemperatureSamples {
    samples(body)
        .filter(|s| s.name == HWMON_TEMPERATURE && s.labels.is_some() && is_decimal_reading(s.value))
        .map(|s| (s.text.to_string(), s.value.to_string()))
        .collect()
}
