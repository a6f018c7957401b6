//! Physical row sources with encoding and delimiter auto-detection.
//!
//! The import controller only needs "next row of cells, or end". Quoting and
//! delimiters are left to the `csv` crate.

use log::debug;
use std::collections::VecDeque;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::{CsvError, CsvResult};

/// A reader of physical rows.
pub trait RowSource {
    /// Next row of cells, or `None` at end of input.
    fn read_row(&mut self) -> CsvResult<Option<Vec<String>>>;

    /// 1-based physical line the last row started on, when the source
    /// tracks it. Blank lines and quoted line breaks count.
    fn line(&self) -> Option<usize> {
        None
    }
}

impl<T: RowSource + ?Sized> RowSource for Box<T> {
    fn read_row(&mut self) -> CsvResult<Option<Vec<String>>> {
        (**self).read_row()
    }

    fn line(&self) -> Option<usize> {
        (**self).line()
    }
}

/// Records the offsets of `\r` and `\n` bytes as they are read, so rows
/// can be mapped back to physical lines.
struct LineTracker<R> {
    inner: R,
    offset: u64,
    breaks: VecDeque<(u64, u8)>,
}

impl<R: Read> Read for LineTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        for (i, byte) in buf[..n].iter().enumerate() {
            if *byte == b'\n' || *byte == b'\r' {
                self.breaks.push_back((self.offset + i as u64, *byte));
            }
        }
        self.offset += n as u64;
        Ok(n)
    }
}

/// Rows read from CSV text.
pub struct CsvRowSource<R: Read> {
    reader: csv::Reader<LineTracker<R>>,
    record: csv::StringRecord,
    /// Byte offset just past the last row read.
    consumed: u64,
    /// Newlines before `consumed`.
    newlines: usize,
    line: Option<usize>,
}

impl<R: Read> CsvRowSource<R> {
    pub fn new(reader: R, delimiter: char, trim: bool) -> CsvResult<Self> {
        let tracker = LineTracker {
            inner: reader,
            offset: 0,
            breaks: VecDeque::new(),
        };
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter_byte(delimiter)?)
            .trim(if trim { csv::Trim::All } else { csv::Trim::None })
            .from_reader(tracker);
        Ok(Self {
            reader,
            record: csv::StringRecord::new(),
            consumed: 0,
            newlines: 0,
            line: None,
        })
    }

    /// Skip the blank lines the reader passed over before the row ending at
    /// `end`, then count the line breaks inside it.
    fn advance_lines(&mut self, end: u64) {
        let breaks = &mut self.reader.get_mut().breaks;
        let mut start = self.consumed;
        while let Some(&(pos, byte)) = breaks.front() {
            if pos > start {
                break;
            }
            breaks.pop_front();
            if byte == b'\n' {
                self.newlines += 1;
            }
            if pos == start {
                start += 1;
            }
        }
        self.line = Some(self.newlines + 1);

        while let Some(&(pos, byte)) = breaks.front() {
            if pos >= end {
                break;
            }
            breaks.pop_front();
            if byte == b'\n' {
                self.newlines += 1;
            }
        }
        self.consumed = end.max(start);
    }
}

impl CsvRowSource<Cursor<Vec<u8>>> {
    /// Rows of already-decoded text.
    pub fn from_text(content: &str, delimiter: char, trim: bool) -> CsvResult<Self> {
        let content = content.trim_start_matches('\u{feff}');
        Self::new(Cursor::new(content.as_bytes().to_vec()), delimiter, trim)
    }
}

impl<R: Read> RowSource for CsvRowSource<R> {
    fn read_row(&mut self) -> CsvResult<Option<Vec<String>>> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        let end = self.reader.position().byte();
        self.advance_lines(end);
        Ok(Some(self.record.iter().map(String::from).collect()))
    }

    fn line(&self) -> Option<usize> {
        self.line
    }
}

/// Rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRows {
    rows: VecDeque<Vec<String>>,
}

impl MemoryRows {
    pub fn new<I, R, C>(rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

impl RowSource for MemoryRows {
    fn read_row(&mut self) -> CsvResult<Option<Vec<String>>> {
        Ok(self.rows.pop_front())
    }
}

/// Decoded input with the settings detected for it.
#[derive(Debug, Clone)]
pub struct DecodedInput {
    pub content: String,
    pub encoding: String,
    pub delimiter: char,
}

pub(crate) fn delimiter_byte(delimiter: char) -> CsvResult<u8> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(CsvError::InvalidDelimiter(delimiter))
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(found) => found.decode(bytes).0.into_owned(),
            None => return Err(CsvError::Encoding(format!("unsupported encoding '{}'", encoding))),
        },
    };
    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Most frequent of `, ; TAB |` in the first line; `,` when none appear.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best = ',';
    let mut best_count = 0;
    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best = sep;
        }
    }
    best
}

/// Decode `bytes`, detecting the delimiter unless one is given.
pub fn decode_bytes(bytes: &[u8], delimiter: Option<char>) -> CsvResult<DecodedInput> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
    debug!("Decoded input as {} with delimiter {:?}", encoding, delimiter);
    Ok(DecodedInput {
        content,
        encoding,
        delimiter,
    })
}

/// Read and decode a file.
pub fn read_path<P: AsRef<Path>>(path: P, delimiter: Option<char>) -> CsvResult<DecodedInput> {
    let bytes = std::fs::read(path.as_ref())?;
    decode_bytes(&bytes, delimiter)
}

/// The first row of a decoded input.
pub fn header_row(input: &DecodedInput) -> CsvResult<Vec<String>> {
    let mut source = CsvRowSource::from_text(&input.content, input.delimiter, true)?;
    source.read_row()?.ok_or(CsvError::EmptyFile)
}
