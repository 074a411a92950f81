/// Fixed-schema record scanner.
///
/// Input lines look like
///
/// ```text
/// {"browsers":["..",..],"company":"Tavu","country":"Albania","email":"tHall@Fiveclub.edu","hits":["151.62.127.96",..],"job":"Staff Scientist","name":"Billy Stephens","phone":"508-76-84"}
/// ```
///
/// This is deliberately not a JSON parser. Only the eight field names above are
/// recognised and all of them must appear; values are strings or arrays of
/// strings; no whitespace is allowed between tokens; a string runs to the next
/// `"` byte with no escape handling. Anything else is a
/// [`FilterError::MalformedRecord`]. Field order does not matter and a repeated
/// field overwrites the earlier value.
///
/// One relaxation: an empty array `[]` is accepted and yields no items. The
/// record then simply fails the threshold for that field instead of aborting
/// the batch.
///
/// Returned slices borrow from the line, so scanning allocates only the two
/// array vectors.
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::errors::{FilterError, FilterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Browsers,
    Company,
    Country,
    Email,
    Hits,
    Job,
    Name,
    Phone,
}

impl Field {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

const ALL_FIELDS: u8 = 0xFF;

static FIELDS: Lazy<HashMap<&'static [u8], Field>> = Lazy::new(|| {
    HashMap::from([
        (&b"browsers"[..], Field::Browsers),
        (&b"company"[..], Field::Company),
        (&b"country"[..], Field::Country),
        (&b"email"[..], Field::Email),
        (&b"hits"[..], Field::Hits),
        (&b"job"[..], Field::Job),
        (&b"name"[..], Field::Name),
        (&b"phone"[..], Field::Phone),
    ])
});

/// The fields of one input line that filtering needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record<'a> {
    /// Address strings, parsed lazily by the evaluator
    pub hits: Vec<&'a [u8]>,
    /// User-agent strings
    pub browsers: Vec<&'a [u8]>,
    pub name: &'a [u8],
    pub email: &'a [u8],
}

/// Pulls records out of a single line.
///
/// A line carries exactly one object; [`RecordScanner::next_record`] yields it
/// and then `Ok(None)` once the line is used up. Bytes left over after the
/// object are reported as an error on the following call.
#[derive(Debug)]
pub struct RecordScanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> RecordScanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn next_record(&mut self) -> FilterResult<Option<Record<'a>>> {
        if self.is_exhausted() {
            return Ok(None);
        }

        self.expect(b'{')?;

        let mut record = Record::default();
        let mut seen = 0u8;

        loop {
            let section = self.string()?;
            self.expect(b':')?;

            let field = FIELDS.get(section).copied().ok_or_else(|| {
                malformed(format!(
                    "unknown section: {}",
                    String::from_utf8_lossy(section)
                ))
            })?;

            match field {
                Field::Browsers => record.browsers = self.string_array()?,
                Field::Hits => record.hits = self.string_array()?,
                Field::Email => record.email = self.string()?,
                Field::Name => record.name = self.string()?,
                Field::Company | Field::Country | Field::Job | Field::Phone => {
                    self.string()?;
                }
            }
            seen |= field.bit();

            match self.next_byte()? {
                b',' => {}
                b'}' => break,
                c => {
                    return Err(malformed(format!(
                        "expected ',' or '}}' after value, got {}",
                        show(c)
                    )))
                }
            }
        }

        if seen != ALL_FIELDS {
            return Err(malformed(format!("missing fields: {}", missing(seen))));
        }

        Ok(Some(record))
    }

    fn next_byte(&mut self) -> FilterResult<u8> {
        let c = *self
            .input
            .get(self.pos)
            .ok_or_else(|| malformed("unexpected end of record"))?;
        self.pos += 1;
        Ok(c)
    }

    fn expect(&mut self, want: u8) -> FilterResult<()> {
        let c = self.next_byte()?;
        if c != want {
            return Err(malformed(format!(
                "expected {} got {}",
                show(want),
                show(c)
            )));
        }
        Ok(())
    }

    fn string(&mut self) -> FilterResult<&'a [u8]> {
        self.expect(b'"')?;

        let rest = &self.input[self.pos..];
        let len = rest
            .iter()
            .position(|&c| c == b'"')
            .ok_or_else(|| malformed("unterminated string"))?;
        self.pos += len + 1;

        Ok(&rest[..len])
    }

    fn string_array(&mut self) -> FilterResult<Vec<&'a [u8]>> {
        self.expect(b'[')?;

        let mut items = Vec::new();
        // Empty arrays are tolerated
        if self.input.get(self.pos) == Some(&b']') {
            self.pos += 1;
            return Ok(items);
        }

        loop {
            items.push(self.string()?);
            match self.next_byte()? {
                b']' => break,
                b',' => {}
                c => {
                    return Err(malformed(format!(
                        "expected ',' or ']' in array, got {}",
                        show(c)
                    )))
                }
            }
        }
        Ok(items)
    }
}

/// Scans a line that must hold exactly one record.
pub fn scan_record(line: &[u8]) -> FilterResult<Record<'_>> {
    let mut scanner = RecordScanner::new(line);
    let record = scanner
        .next_record()?
        .ok_or_else(|| malformed("empty record"))?;

    if !scanner.is_exhausted() {
        return Err(malformed("trailing data after record"));
    }
    Ok(record)
}

fn malformed(message: impl Into<String>) -> FilterError {
    FilterError::malformed_record(0, message)
}

fn show(c: u8) -> String {
    format!("'{}'", c.escape_ascii())
}

fn missing(seen: u8) -> String {
    let mut names: Vec<&str> = FIELDS
        .iter()
        .filter(|(_, field)| seen & field.bit() == 0)
        .filter_map(|(name, _)| std::str::from_utf8(name).ok())
        .collect();
    names.sort_unstable();
    names.join(", ")
}
