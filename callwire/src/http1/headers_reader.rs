// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Line-oriented reading of HTTP/1.x header blocks, under a byte budget.

use std::io::{self, BufRead};

use crate::{error::ExchangeError, message::Headers};

/// Ceiling on the bytes one exchange may spend on header lines: the status
/// line, response headers, and any trailers all draw from the same budget.
pub const HEADER_LIMIT: u64 = 256 * 1024;

/// Read one line through `\n`, stripping the line ending (`\r\n` or a bare
/// `\n`). End-of-stream, before any byte or mid-line, is an
/// [`io::ErrorKind::UnexpectedEof`] error.
pub(crate) fn read_line<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut bytes = Vec::new();
    let read = reader.read_until(b'\n', &mut bytes)?;
    if read == 0 || bytes.last() != Some(&b'\n') {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    bytes.pop();
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads header lines while enforcing [`HEADER_LIMIT`] across everything it
/// reads for one exchange.
#[derive(Debug)]
pub struct HeadersReader {
    remaining_budget: u64,
}

impl HeadersReader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            remaining_budget: HEADER_LIMIT,
        }
    }

    /// Read one header-block line, charging it against the budget.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::HeadersTooLarge`] when the budget is exhausted, or
    /// the underlying I/O error.
    pub fn read_line<R: BufRead>(&mut self, reader: &mut R) -> Result<String, ExchangeError> {
        let line = read_line(reader)?;
        let line_bytes = u64::try_from(line.len()).unwrap_or(u64::MAX);
        if line_bytes > self.remaining_budget {
            return Err(ExchangeError::HeadersTooLarge {
                limit: HEADER_LIMIT,
            });
        }
        self.remaining_budget -= line_bytes;
        Ok(line)
    }

    /// Read `Name: Value` lines up to and including the blank line that ends
    /// the block.
    ///
    /// # Errors
    ///
    /// Same conditions as [`read_line`](Self::read_line).
    pub fn read_headers<R: BufRead>(&mut self, reader: &mut R) -> Result<Headers, ExchangeError> {
        let mut builder = Headers::builder();
        loop {
            let line = self.read_line(reader)?;
            if line.is_empty() {
                return Ok(builder.build());
            }
            builder.add_lenient_line(&line);
        }
    }
}

impl Default for HeadersReader {
    fn default() -> Self { Self::new() }
}
