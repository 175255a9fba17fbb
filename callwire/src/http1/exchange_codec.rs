// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Encodes one HTTP/1.1 request and decodes one HTTP/1.1 response over a
//! reusable byte-stream socket.
//!
//! The exchange is a strict state machine; any operation invoked out of
//! order is a caller bug and panics, because an out-of-order read or write
//! would corrupt a socket that the pool may hand to the next exchange.
//!
//! ```text
//! Idle
//!   │ write_request_headers
//!   ▼
//! OpenRequestBody ──────────────────────────────┐
//!   │ create_request_body                       │
//!   ▼                                           │ read_response_headers
//! WritingRequestBody                            │ (bodyless request)
//!   │ sink close                                │
//!   ▼                                           │
//! ReadResponseHeaders ◄─────────────────────────┘
//!   │ read_response_headers (1xx loops here)
//!   ▼
//! OpenResponseBody
//!   │ open_response_body_source
//!   ▼
//! ReadingResponseBody
//!   │ body fully read, or truncated
//!   ▼
//! Closed
//! ```

use std::{fmt,
          io::{self, BufReader, BufWriter, Read, Write},
          sync::Arc};

use crate::{connection::{Carrier, CookieJar, NoCookieJar},
            error::ExchangeError,
            message::{Headers, HttpUrl, Method, Request, Response},
            socket_io::SocketTimeouts};

use super::{HeadersReader, StatusLine, headers_reader::read_line, request_line};

pub mod codec_constants {
    use std::time::Duration;

    /// How long to wait for a discarded response body to drain before
    /// retiring the connection instead of reusing it.
    pub const DISCARD_STREAM_TIMEOUT: Duration = Duration::from_millis(100);

    /// Ceiling on bytes skimmed off a CONNECT response that wrongly carried
    /// a body (`i32::MAX`).
    pub const MAX_CONNECT_BODY_BYTES: u64 = 2_147_483_647;
}

/// Lifecycle position of the exchange. See the module diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    OpenRequestBody,
    WritingRequestBody,
    ReadResponseHeaders,
    OpenResponseBody,
    ReadingResponseBody,
    Closed,
}

/// What ended the response body. Populated exactly when the state reaches
/// [`State::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Trailers {
    /// The body terminated normally; chunked bodies may carry headers here,
    /// all other framings produce an empty set.
    Received(Headers),
    /// The body ended abnormally; whatever trailers existed are lost.
    Truncated,
}

/// Drives a single HTTP/1.1 request/response exchange.
///
/// One thread drives the codec through its lifecycle; only [`cancel`] is
/// safe from other threads (it delegates to the carrier, which aborts the
/// socket). Body sinks and sources borrow the codec mutably, so the borrow
/// checker enforces that the exchange is linear.
///
/// [`cancel`]: Self::cancel
pub struct Http1ExchangeCodec<R: Read, W: Write> {
    carrier: Arc<dyn Carrier>,
    timeouts: Arc<dyn SocketTimeouts>,
    cookie_jar: Arc<dyn CookieJar>,
    reader: BufReader<R>,
    writer: BufWriter<W>,
    headers_reader: HeadersReader,
    state: State,
    trailers: Option<Trailers>,
    request_method: Option<Method>,
    request_url: Option<HttpUrl>,
}

impl<R: Read, W: Write> Http1ExchangeCodec<R, W> {
    pub fn new(
        carrier: Arc<dyn Carrier>,
        timeouts: Arc<dyn SocketTimeouts>,
        reader: R,
        writer: W,
    ) -> Self {
        Self {
            carrier,
            timeouts,
            cookie_jar: Arc::new(NoCookieJar),
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            headers_reader: HeadersReader::new(),
            state: State::Idle,
            trailers: None,
            request_method: None,
            request_url: None,
        }
    }

    /// Install the jar that receives trailer headers, the same way response
    /// headers are handed to cookies upstream.
    #[must_use]
    pub fn with_cookie_jar(mut self, cookie_jar: Arc<dyn CookieJar>) -> Self {
        self.cookie_jar = cookie_jar;
        self
    }

    #[must_use]
    pub fn carrier(&self) -> &Arc<dyn Carrier> { &self.carrier }

    #[must_use]
    pub fn is_response_complete(&self) -> bool { self.state == State::Closed }

    /// Abort the exchange's socket. Safe from any thread via the carrier.
    pub fn cancel(&self) { self.carrier.cancel(); }

    /// Write the request line and headers for `request`.
    ///
    /// # Errors
    ///
    /// I/O failure writing to the socket.
    ///
    /// # Panics
    ///
    /// If the exchange is not in its initial state.
    pub fn write_request_headers(&mut self, request: &Request) -> Result<(), ExchangeError> {
        let line = request_line(request, self.carrier.route());
        self.request_method = Some(request.method);
        self.request_url = Some(request.url.clone());
        self.write_request(&request.headers, &line)
    }

    /// Write an arbitrary header block and request line. The CONNECT tunnel
    /// handshake uses this directly.
    ///
    /// # Errors
    ///
    /// I/O failure writing to the socket.
    ///
    /// # Panics
    ///
    /// If the exchange is not in its initial state.
    pub fn write_request(
        &mut self,
        headers: &Headers,
        request_line: &str,
    ) -> Result<(), ExchangeError> {
        assert!(self.state == State::Idle, "state: {:?}", self.state);
        self.writer.write_all(request_line.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        for (name, value) in headers {
            self.writer.write_all(name.as_bytes())?;
            self.writer.write_all(b": ")?;
            self.writer.write_all(value.as_bytes())?;
            self.writer.write_all(b"\r\n")?;
        }
        self.writer.write_all(b"\r\n")?;
        self.state = State::OpenRequestBody;
        Ok(())
    }

    /// A sink for the request body. The caller must [`close`] it to move the
    /// exchange on to reading response headers.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::DuplexBody`] - HTTP/1 cannot frame a duplex body.
    ///
    /// # Panics
    ///
    /// If the request neither declares chunked encoding nor a non-negative
    /// content length: the caller must pre-buffer or choose chunked.
    ///
    /// [`close`]: RequestBodySink::close
    pub fn create_request_body(
        &mut self,
        request: &Request,
        content_length: i64,
    ) -> Result<RequestBodySink<'_, R, W>, ExchangeError> {
        if request.body.is_some_and(|body| body.is_duplex()) {
            return Err(ExchangeError::DuplexBody);
        }
        if request.is_chunked() {
            return Ok(self.new_sink(SinkKind::Chunked));
        }
        if content_length >= 0 {
            return Ok(self.new_sink(SinkKind::KnownLength));
        }
        panic!("cannot stream a request body without chunked encoding or a known content length");
    }

    fn new_sink(&mut self, kind: SinkKind) -> RequestBodySink<'_, R, W> {
        assert!(self.state == State::OpenRequestBody, "state: {:?}", self.state);
        self.state = State::WritingRequestBody;
        RequestBodySink { codec: self, kind }
    }

    /// Flush bytes written so far to the socket.
    ///
    /// # Errors
    ///
    /// I/O failure writing to the socket.
    pub fn flush_request(&mut self) -> Result<(), ExchangeError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush the complete request to the socket. The outbound direction is
    /// never half-closed; the socket stays writable for the next exchange.
    ///
    /// # Errors
    ///
    /// I/O failure writing to the socket.
    pub fn finish_request(&mut self) -> Result<(), ExchangeError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Read one response header block.
    ///
    /// Returns `None` when `expect_continue` is set and the server answered
    /// `100 Continue`: the request body may now be sent, and this must be
    /// called again for the real response. Interim responses (an unsolicited
    /// 100, or any code in `[102, 200)` such as `103 Early Hints`) are
    /// returned as `Some` and leave the codec ready for another header
    /// block; the first response with any other code is final and opens the
    /// response body.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::MalformedStatusLine`], budget or I/O errors;
    /// end-of-stream surfaces as [`ExchangeError::UnexpectedEndOfStream`]
    /// carrying the redacted request URL.
    ///
    /// # Panics
    ///
    /// If a response body is already open or the exchange is closed.
    pub fn read_response_headers(
        &mut self,
        expect_continue: bool,
    ) -> Result<Option<Response>, ExchangeError> {
        assert!(
            matches!(
                self.state,
                State::Idle
                    | State::OpenRequestBody
                    | State::WritingRequestBody
                    | State::ReadResponseHeaders
            ),
            "state: {:?}",
            self.state
        );

        let read_head = (|| -> Result<(StatusLine, Headers), ExchangeError> {
            let line = self.headers_reader.read_line(&mut self.reader)?;
            let status_line = StatusLine::parse(&line)?;
            let headers = self.headers_reader.read_headers(&mut self.reader)?;
            Ok((status_line, headers))
        })();

        let (status_line, headers) = match read_head {
            Ok(head) => head,
            Err(err) => {
                let err = self.map_read_error(err);
                self.carrier.track_failure(&err);
                return Err(err);
            }
        };

        let response = Response {
            protocol: status_line.protocol,
            code: status_line.code,
            message: status_line.message,
            headers,
            request_method: self.request_method.unwrap_or(Method::Get),
            request_url: self.effective_url(),
        };

        if expect_continue && response.code == 100 {
            // The caller decides when to resume and reads headers again.
            return Ok(None);
        }
        if response.code == 100 || (102..200).contains(&response.code) {
            self.state = State::ReadResponseHeaders;
            return Ok(Some(response));
        }
        self.state = State::OpenResponseBody;
        Ok(Some(response))
    }

    /// The body length this response announces: `0` when HTTP semantics
    /// forbid a body (HEAD, 1xx, 204, 304), `−1` when the length is unknown
    /// in advance (chunked, or no usable `Content-Length`), else the
    /// declared length.
    #[must_use]
    pub fn reported_content_length(&self, response: &Response) -> i64 {
        if !response.promises_body() {
            0
        } else if response.is_chunked() {
            -1
        } else {
            response.headers.content_length()
        }
    }

    /// A lazy source for the response body. Choosing the unknown-length
    /// framing retires the connection immediately: once "until end of
    /// stream" is the only terminator, the socket cannot host another
    /// exchange.
    ///
    /// # Errors
    ///
    /// Reserved for transport failures while priming the source; selection
    /// itself cannot fail.
    ///
    /// # Panics
    ///
    /// If the final response headers have not been read yet.
    pub fn open_response_body_source(
        &mut self,
        response: &Response,
    ) -> Result<ResponseBodySource<'_, R, W>, ExchangeError> {
        assert!(self.state == State::OpenResponseBody, "state: {:?}", self.state);
        self.state = State::ReadingResponseBody;

        let kind = if !response.promises_body() {
            self.response_body_complete(Trailers::Received(Headers::default()));
            SourceKind::Fixed { bytes_remaining: 0 }
        } else if response.is_chunked() {
            SourceKind::Chunked {
                bytes_remaining_in_chunk: 0,
                seen_first_chunk: false,
                has_more_chunks: true,
            }
        } else {
            let content_length = response.headers.content_length();
            if content_length >= 0 {
                if content_length == 0 {
                    self.response_body_complete(Trailers::Received(Headers::default()));
                }
                SourceKind::Fixed {
                    bytes_remaining: content_length.unsigned_abs(),
                }
            } else {
                self.carrier.no_new_exchanges();
                SourceKind::Unknown {
                    input_exhausted: false,
                }
            }
        };
        Ok(ResponseBodySource { codec: self, kind })
    }

    /// The trailers that ended the response body.
    ///
    /// Returns `None` while the body is still incomplete; chunked bodies
    /// produce their trailer block, every other framing an empty set.
    ///
    /// # Errors
    ///
    /// [`ExchangeError::TrailersTruncated`] if the body ended abnormally.
    ///
    /// # Panics
    ///
    /// If no response body has been opened.
    pub fn peek_trailers(&self) -> Result<Option<Headers>, ExchangeError> {
        assert!(
            matches!(self.state, State::ReadingResponseBody | State::Closed),
            "state: {:?}",
            self.state
        );
        match &self.trailers {
            Some(Trailers::Truncated) => Err(ExchangeError::TrailersTruncated),
            Some(Trailers::Received(headers)) => Ok(Some(headers.clone())),
            None => Ok(None),
        }
    }

    /// Discard the body a CONNECT response should never have carried, so the
    /// tunnel starts at a clean stream position.
    ///
    /// # Errors
    ///
    /// Transport failures while skimming.
    ///
    /// # Panics
    ///
    /// If the final response headers have not been read yet.
    pub fn skip_connect_body(&mut self, response: &Response) -> Result<(), ExchangeError> {
        let content_length = response.headers.content_length();
        if content_length <= 0 {
            return Ok(());
        }
        let source = self.open_response_body_source(response)?;
        source.finish(codec_constants::MAX_CONNECT_BODY_BYTES);
        Ok(())
    }

    /// Seal the response body: install `trailers`, hand non-empty received
    /// trailers to the cookie jar, reset the read deadline this body was
    /// using, and close the exchange.
    fn response_body_complete(&mut self, trailers: Trailers) {
        if self.state == State::Closed {
            return;
        }
        match &trailers {
            Trailers::Received(headers) if !headers.is_empty() => {
                let url = self.effective_url();
                self.cookie_jar.save_from_trailers(&url, headers);
            }
            Trailers::Received(_) => {}
            Trailers::Truncated => {
                tracing::debug!(
                    url = %self.redacted_url(),
                    "response body truncated; connection will not be reused"
                );
            }
        }
        if self.timeouts.set_read_timeout(None).is_err() {
            tracing::debug!("could not reset the read deadline after a response body");
        }
        self.trailers = Some(trailers);
        self.state = State::Closed;
    }

    /// Retire the connection and seal the exchange as truncated.
    fn retire_truncated(&mut self) {
        self.carrier.no_new_exchanges();
        self.response_body_complete(Trailers::Truncated);
    }

    fn map_read_error(&self, err: ExchangeError) -> ExchangeError {
        match err {
            ExchangeError::Io(io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
                ExchangeError::UnexpectedEndOfStream {
                    url: self.redacted_url(),
                }
            }
            other => other,
        }
    }

    fn effective_url(&self) -> HttpUrl {
        self.request_url
            .clone()
            .unwrap_or_else(|| self.carrier.route().address_url.clone())
    }

    fn redacted_url(&self) -> String { self.effective_url().redact() }
}

impl<R: Read, W: Write> fmt::Debug for Http1ExchangeCodec<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http1ExchangeCodec")
            .field("state", &self.state)
            .field("trailers", &self.trailers)
            .field("request_method", &self.request_method)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkKind {
    /// Bytes pass through verbatim; `Content-Length` already framed them.
    KnownLength,
    /// Each write becomes one `<hex-size>\r\n<bytes>\r\n` chunk.
    Chunked,
}

/// Sink for a request body. Dropping it without [`close`] leaves the
/// exchange unusable; close it even when abandoning the request.
///
/// [`close`]: Self::close
pub struct RequestBodySink<'a, R: Read, W: Write> {
    codec: &'a mut Http1ExchangeCodec<R, W>,
    kind: SinkKind,
}

impl<R: Read, W: Write> RequestBodySink<'_, R, W> {
    /// Terminate the body (chunked sinks emit `0\r\n\r\n`), release the
    /// write deadline, and move the exchange on to reading response headers.
    ///
    /// # Errors
    ///
    /// I/O failure writing the terminator.
    pub fn close(self) -> io::Result<()> {
        if self.kind == SinkKind::Chunked {
            self.codec.writer.write_all(b"0\r\n\r\n")?;
        }
        if self.codec.timeouts.set_write_timeout(None).is_err() {
            tracing::debug!("could not reset the write deadline after a request body");
        }
        self.codec.state = State::ReadResponseHeaders;
        Ok(())
    }
}

impl<R: Read, W: Write> Write for RequestBodySink<'_, R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.kind {
            SinkKind::KnownLength => {
                self.codec.writer.write_all(buf)?;
                Ok(buf.len())
            }
            SinkKind::Chunked => {
                // A zero-length chunk would be the terminator; skip it.
                if buf.is_empty() {
                    return Ok(0);
                }
                write!(self.codec.writer, "{:x}\r\n", buf.len())?;
                self.codec.writer.write_all(buf)?;
                self.codec.writer.write_all(b"\r\n")?;
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> { self.codec.writer.flush() }
}

impl<R: Read, W: Write> fmt::Debug for RequestBodySink<'_, R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBodySink")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    /// Exactly `bytes_remaining` bytes left on the wire.
    Fixed { bytes_remaining: u64 },
    /// `<hex>[;ext]\r\n<bytes>\r\n` frames until the zero chunk, which is
    /// followed by the trailer block.
    Chunked {
        bytes_remaining_in_chunk: u64,
        seen_first_chunk: bool,
        has_more_chunks: bool,
    },
    /// No trustworthy framing; the body runs to end of stream.
    Unknown { input_exhausted: bool },
}

/// Lazy source for a response body.
///
/// Reading to completion seals the exchange and leaves the connection
/// reusable (framing permitting). [`close`] may be called early: a remainder
/// that drains within the discard timeout keeps the connection reusable,
/// anything else retires it. Dropping the source mid-body never blocks; it
/// retires the connection and records the trailers as lost.
///
/// [`close`]: Self::close
pub struct ResponseBodySource<'a, R: Read, W: Write> {
    codec: &'a mut Http1ExchangeCodec<R, W>,
    kind: SourceKind,
}

impl<R: Read, W: Write> ResponseBodySource<'_, R, W> {
    /// Release this source before the body is fully read. Drains the
    /// remainder if it arrives within [`DISCARD_STREAM_TIMEOUT`]; otherwise
    /// the connection is retired and the trailers are recorded as lost.
    ///
    /// [`DISCARD_STREAM_TIMEOUT`]: codec_constants::DISCARD_STREAM_TIMEOUT
    pub fn close(self) { self.finish(u64::MAX); }

    fn finish(mut self, byte_cap: u64) {
        if self.is_complete() {
            return;
        }
        let drained = self.drain(byte_cap);
        if !drained && !self.is_complete() {
            self.codec.retire_truncated();
        }
    }

    fn is_complete(&self) -> bool { self.codec.state == State::Closed }

    /// Read and discard until the body completes, an error occurs, or
    /// `byte_cap` is spent, under the discard read deadline. Returns true if
    /// the body completed.
    fn drain(&mut self, mut byte_cap: u64) -> bool {
        if self
            .codec
            .timeouts
            .set_read_timeout(Some(codec_constants::DISCARD_STREAM_TIMEOUT))
            .is_err()
        {
            return false;
        }
        let mut scratch = [0u8; 8 * 1024];
        let completed = loop {
            if self.is_complete() {
                break true;
            }
            if byte_cap == 0 {
                break false;
            }
            let max = clamp_len(scratch.len(), byte_cap);
            match self.read_some(&mut scratch[..max]) {
                Ok(0) => break self.is_complete(),
                Ok(read) => byte_cap -= read as u64,
                Err(_) => break false,
            }
        };
        if self.codec.timeouts.set_read_timeout(None).is_err() {
            tracing::debug!("could not reset the read deadline after a body drain");
        }
        completed
    }

    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match &mut self.kind {
            SourceKind::Fixed { bytes_remaining } => {
                if *bytes_remaining == 0 {
                    return Ok(0);
                }
                let max = clamp_len(buf.len(), *bytes_remaining);
                let read = match self.codec.reader.read(&mut buf[..max]) {
                    Ok(read) => read,
                    Err(err) => {
                        self.codec.retire_truncated();
                        return Err(err);
                    }
                };
                if read == 0 {
                    self.codec.retire_truncated();
                    return Err(ExchangeError::UnexpectedEndOfStream {
                        url: self.codec.redacted_url(),
                    }
                    .into());
                }
                *bytes_remaining -= read as u64;
                if *bytes_remaining == 0 {
                    self.codec
                        .response_body_complete(Trailers::Received(Headers::default()));
                }
                Ok(read)
            }

            SourceKind::Chunked {
                bytes_remaining_in_chunk,
                seen_first_chunk,
                has_more_chunks,
            } => {
                if !*has_more_chunks {
                    return Ok(0);
                }
                if *bytes_remaining_in_chunk == 0 {
                    if *seen_first_chunk {
                        // The CRLF that closes the previous chunk's data.
                        if let Err(err) = read_line(&mut self.codec.reader) {
                            let err = self.codec.map_read_error(err.into());
                            self.codec.retire_truncated();
                            return Err(err.into());
                        }
                    }
                    let size_line = match read_line(&mut self.codec.reader) {
                        Ok(line) => line,
                        Err(err) => {
                            let err = self.codec.map_read_error(err.into());
                            self.codec.retire_truncated();
                            return Err(err.into());
                        }
                    };
                    let Some(chunk_size) = chunk_size::parse(&size_line) else {
                        self.codec.retire_truncated();
                        return Err(ExchangeError::MalformedChunkSize {
                            line: size_line,
                        }
                        .into());
                    };
                    *seen_first_chunk = true;
                    *bytes_remaining_in_chunk = chunk_size;

                    if chunk_size == 0 {
                        *has_more_chunks = false;
                        let trailers = {
                            let codec = &mut *self.codec;
                            codec.headers_reader.read_headers(&mut codec.reader)
                        };
                        match trailers {
                            Ok(trailers) => {
                                self.codec
                                    .response_body_complete(Trailers::Received(trailers));
                            }
                            Err(err) => {
                                let err = self.codec.map_read_error(err);
                                self.codec.retire_truncated();
                                return Err(err.into());
                            }
                        }
                        return Ok(0);
                    }
                }

                let max = clamp_len(buf.len(), *bytes_remaining_in_chunk);
                let read = match self.codec.reader.read(&mut buf[..max]) {
                    Ok(read) => read,
                    Err(err) => {
                        self.codec.retire_truncated();
                        return Err(err);
                    }
                };
                if read == 0 {
                    self.codec.retire_truncated();
                    return Err(ExchangeError::UnexpectedEndOfStream {
                        url: self.codec.redacted_url(),
                    }
                    .into());
                }
                *bytes_remaining_in_chunk -= read as u64;
                Ok(read)
            }

            SourceKind::Unknown { input_exhausted } => {
                if *input_exhausted {
                    return Ok(0);
                }
                match self.codec.reader.read(buf) {
                    Ok(0) => {
                        *input_exhausted = true;
                        self.codec
                            .response_body_complete(Trailers::Received(Headers::default()));
                        Ok(0)
                    }
                    Ok(read) => Ok(read),
                    Err(err) => {
                        self.codec.retire_truncated();
                        Err(err)
                    }
                }
            }
        }
    }
}

impl<R: Read, W: Write> Read for ResponseBodySource<'_, R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.read_some(buf) }
}

impl<R: Read, W: Write> Drop for ResponseBodySource<'_, R, W> {
    fn drop(&mut self) {
        // Never block here; an un-drained body just costs the connection.
        if !self.is_complete() {
            self.codec.retire_truncated();
        }
    }
}

impl<R: Read, W: Write> fmt::Debug for ResponseBodySource<'_, R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBodySource")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The largest prefix of a `buf_len`-byte buffer that stays within `cap`.
#[allow(clippy::cast_possible_truncation)] // `cap < buf_len` implies it fits in usize.
fn clamp_len(buf_len: usize, cap: u64) -> usize {
    if cap < buf_len as u64 { cap as usize } else { buf_len }
}

mod chunk_size {
    use nom::{IResult, Parser, bytes::complete::take_while1, combinator::map_res};

    /// Parse `<hex>[;extensions]`, returning `None` for anything malformed.
    /// Extensions are not interpreted, but when present they must begin
    /// with `;`.
    pub fn parse(line: &str) -> Option<u64> {
        match hex_size(line) {
            Ok((rest, size)) => {
                let rest = rest.trim();
                (rest.is_empty() || rest.starts_with(';')).then_some(size)
            }
            Err(_) => None,
        }
    }

    fn hex_size(input: &str) -> IResult<&str, u64> {
        map_res(take_while1(|c: char| c.is_ascii_hexdigit()), |digits| {
            u64::from_str_radix(digits, 16)
        })
        .parse(input)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::Route,
                message::{Method, Request, RequestBody, Scheme},
                test_fixtures::{MockSocket, RecordedTimeouts, RecordingCarrier,
                                RecordingCookieJar, SharedWriter, WrittenBytes,
                                mock_socket}};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    type TestCodec = Http1ExchangeCodec<Cursor<Vec<u8>>, SharedWriter>;

    fn test_url() -> HttpUrl { HttpUrl::new(Scheme::Http, "example.com").with_path("/a") }

    fn codec_for(
        server_script: &str,
    ) -> (TestCodec, Arc<RecordingCarrier>, WrittenBytes, Arc<RecordedTimeouts>) {
        let MockSocket {
            reader,
            writer,
            written,
            timeouts,
        } = mock_socket(server_script);
        let carrier = Arc::new(RecordingCarrier::new(Route::direct(test_url())));
        let codec = Http1ExchangeCodec::new(
            carrier.clone(),
            timeouts.clone(),
            reader,
            writer,
        );
        (codec, carrier, written, timeouts)
    }

    fn get_request() -> Request {
        Request::new(Method::Get, test_url())
            .with_headers(Headers::builder().add("Host", "example.com").build())
    }

    #[test]
    fn request_headers_render_exactly() {
        let (mut codec, _carrier, written, _timeouts) = codec_for("");
        codec.write_request_headers(&get_request()).unwrap();
        codec.finish_request().unwrap();

        assert_eq!(
            written.utf8(),
            "GET /a HTTP/1.1\r\nHost: example.com\r\n\r\n"
        );
    }

    #[test]
    fn s2_chunked_response_with_trailers() {
        let script = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                      5\r\nhello\r\n0\r\nX-Trailer: v\r\n\r\n";
        let (codec, carrier, _written, _timeouts) = codec_for(script);
        let cookie_jar = Arc::new(RecordingCookieJar::default());
        let mut codec = codec.with_cookie_jar(cookie_jar.clone());

        let response = codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(response.code, 200);
        assert!(response.is_chunked());

        let mut source = codec.open_response_body_source(&response).unwrap();
        let mut body = String::new();
        source.read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");
        drop(source);

        assert!(codec.is_response_complete());
        let trailers = codec.peek_trailers().unwrap().unwrap();
        assert_eq!(trailers.get("X-Trailer"), Some("v"));

        // The connection stayed reusable, and the trailers reached cookies.
        assert!(!carrier.is_retired());
        let saved = cookie_jar.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1.get("X-Trailer"), Some("v"));
    }

    #[test]
    fn s3_expect_continue_reads_the_interim_then_the_final_response() {
        let script = "HTTP/1.1 100 Continue\r\n\r\n\
                      HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";
        let (mut codec, _carrier, _written, _timeouts) = codec_for(script);
        codec.write_request_headers(&get_request()).unwrap();

        // 100 Continue against an expectant caller: no response yet.
        assert!(codec.read_response_headers(true).unwrap().is_none());

        let response = codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(response.code, 200);

        // The final response opened the response body.
        let source = codec.open_response_body_source(&response).unwrap();
        drop(source);
        assert!(codec.is_response_complete());
    }

    #[test]
    fn unsolicited_100_is_returned_as_an_interim_response() {
        let script = "HTTP/1.1 100 Continue\r\n\r\n\
                      HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";
        let (mut codec, _carrier, _written, _timeouts) = codec_for(script);

        let interim = codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(interim.code, 100);

        let final_response = codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(final_response.code, 200);
    }

    #[test]
    fn s6_early_hints_precede_the_final_response() {
        let script = "HTTP/1.1 103 Early Hints\r\nLink: </a>\r\n\r\n\
                      HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";
        let (mut codec, _carrier, _written, _timeouts) = codec_for(script);

        let hints = codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(hints.code, 103);
        assert_eq!(hints.header("Link"), Some("</a>"));

        let response = codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(response.code, 200);

        // A zero-length body: immediately at end of stream, trailers empty.
        let mut source = codec.open_response_body_source(&response).unwrap();
        let mut body = Vec::new();
        source.read_to_end(&mut body).unwrap();
        assert!(body.is_empty());
        drop(source);

        assert!(codec.is_response_complete());
        assert_eq!(codec.peek_trailers().unwrap(), Some(Headers::default()));
    }

    #[test]
    fn s4_truncated_fixed_body_is_a_protocol_error_and_retires_the_connection() {
        let script = "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabcd";
        let (mut codec, carrier, _written, _timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        let mut source = codec.open_response_body_source(&response).unwrap();

        let mut buf = [0u8; 10];
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        let err = source.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        drop(source);

        assert!(carrier.is_retired());
        assert!(codec.is_response_complete());
        assert!(matches!(
            codec.peek_trailers(),
            Err(ExchangeError::TrailersTruncated)
        ));
    }

    #[test]
    fn chunked_sink_output_decodes_back_to_the_same_bytes() {
        // Encode.
        let (mut codec, _carrier, written, _timeouts) = codec_for("");
        let request = Request::new(Method::Post, test_url()).with_headers(
            Headers::builder().add("Transfer-Encoding", "chunked").build(),
        );
        codec.write_request_headers(&request).unwrap();
        let mut sink = codec.create_request_body(&request, -1).unwrap();
        sink.write_all(b"hello ").unwrap();
        assert_eq!(sink.write(b"").unwrap(), 0); // zero-length write is a no-op
        sink.write_all(b"world").unwrap();
        sink.close().unwrap();
        codec.finish_request().unwrap();

        let wire = written.utf8();
        let body_start = wire.find("\r\n\r\n").unwrap() + 4;
        assert_eq!(&wire[body_start..], "6\r\nhello \r\n5\r\nworld\r\n0\r\n\r\n");

        // Decode what was encoded.
        let script = format!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n{}",
            &wire[body_start..]
        );
        let (mut codec, _carrier, _written, _timeouts) = codec_for(&script);
        let response = codec.read_response_headers(false).unwrap().unwrap();
        let mut source = codec.open_response_body_source(&response).unwrap();
        let mut body = String::new();
        source.read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello world");
    }

    #[test]
    fn known_length_sink_writes_verbatim_and_releases_its_deadline() {
        let (mut codec, _carrier, written, timeouts) = codec_for("");
        let request = get_request();
        codec.write_request_headers(&request).unwrap();

        let mut sink = codec.create_request_body(&request, 5).unwrap();
        sink.write_all(b"hello").unwrap();
        sink.close().unwrap();
        codec.finish_request().unwrap();

        assert!(written.utf8().ends_with("\r\n\r\nhello"));
        // Closing the sink reset the write deadline to the default.
        assert_eq!(timeouts.write_timeouts(), vec![None]);

        // The codec moved on to reading response headers; a second body is
        // out of order. (Separately verified by the state panic tests.)
        assert!(!codec.is_response_complete());
    }

    #[test]
    fn duplex_request_bodies_are_rejected() {
        let (mut codec, _carrier, _written, _timeouts) = codec_for("");
        let request = get_request().with_body(RequestBody::duplex());
        codec.write_request_headers(&request).unwrap();

        let err = codec.create_request_body(&request, 5).unwrap_err();
        assert!(matches!(err, ExchangeError::DuplexBody));
    }

    #[test]
    #[should_panic(expected = "without chunked encoding")]
    fn streaming_without_a_length_is_a_caller_bug() {
        let (mut codec, _carrier, _written, _timeouts) = codec_for("");
        let request = get_request();
        codec.write_request_headers(&request).unwrap();
        let _ = codec.create_request_body(&request, -1);
    }

    #[test]
    #[should_panic(expected = "state:")]
    fn writing_request_headers_twice_is_a_caller_bug() {
        let (mut codec, _carrier, _written, _timeouts) = codec_for("");
        codec.write_request_headers(&get_request()).unwrap();
        let _ = codec.write_request_headers(&get_request());
    }

    #[test]
    #[should_panic(expected = "state:")]
    fn reading_headers_after_the_exchange_closed_is_a_caller_bug() {
        let script = "HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nx";
        let (mut codec, _carrier, _written, _timeouts) = codec_for(script);
        let response = codec.read_response_headers(false).unwrap().unwrap();
        {
            let mut source = codec.open_response_body_source(&response).unwrap();
            let mut body = Vec::new();
            source.read_to_end(&mut body).unwrap();
        }
        let _ = codec.read_response_headers(false);
    }

    #[test]
    fn reported_content_length_follows_http_semantics() {
        let (codec, _carrier, _written, _timeouts) = codec_for("");

        let mut response = Response {
            protocol: crate::message::Protocol::Http11,
            code: 200,
            message: "OK".into(),
            headers: Headers::builder().add("Content-Length", "42").build(),
            request_method: Method::Get,
            request_url: test_url(),
        };
        assert_eq!(codec.reported_content_length(&response), 42);

        response.request_method = Method::Head;
        assert_eq!(codec.reported_content_length(&response), 0);
        response.request_method = Method::Get;

        response.code = 204;
        assert_eq!(codec.reported_content_length(&response), 0);
        response.code = 304;
        assert_eq!(codec.reported_content_length(&response), 0);
        response.code = 200;

        response.headers = Headers::builder().add("Transfer-Encoding", "chunked").build();
        assert_eq!(codec.reported_content_length(&response), -1);

        response.headers = Headers::default();
        assert_eq!(codec.reported_content_length(&response), -1);
    }

    #[test]
    fn unknown_length_bodies_retire_the_connection_at_open() {
        let script = "HTTP/1.1 200 OK\r\n\r\nuntil the end";
        let (mut codec, carrier, _written, _timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        let mut source = codec.open_response_body_source(&response).unwrap();

        // Retired the moment the ambiguous framing was chosen.
        assert!(carrier.is_retired());

        let mut body = String::new();
        source.read_to_string(&mut body).unwrap();
        assert_eq!(body, "until the end");
        drop(source);

        assert!(codec.is_response_complete());
        assert_eq!(codec.peek_trailers().unwrap(), Some(Headers::default()));
    }

    #[test]
    fn early_close_that_drains_in_time_keeps_the_connection_reusable() {
        let script = "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n0123456789";
        let (mut codec, carrier, _written, timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        let mut source = codec.open_response_body_source(&response).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        source.close();

        assert!(!carrier.is_retired());
        assert!(codec.is_response_complete());
        assert_eq!(codec.peek_trailers().unwrap(), Some(Headers::default()));

        // The drain scoped the discard deadline and gave it back.
        let read_timeouts = timeouts.read_timeouts();
        assert_eq!(
            read_timeouts.first(),
            Some(&Some(codec_constants::DISCARD_STREAM_TIMEOUT))
        );
        assert_eq!(read_timeouts.last(), Some(&None));
    }

    #[test]
    fn early_close_that_cannot_drain_retires_the_connection() {
        // Ten bytes promised, only four ever arrive.
        let script = "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n0123";
        let (mut codec, carrier, _written, _timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        let mut source = codec.open_response_body_source(&response).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        source.close();

        assert!(carrier.is_retired());
        assert!(codec.is_response_complete());
        assert!(matches!(
            codec.peek_trailers(),
            Err(ExchangeError::TrailersTruncated)
        ));
    }

    #[test]
    fn dropping_a_source_mid_body_retires_without_blocking() {
        let script = "HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n0123456789";
        let (mut codec, carrier, _written, _timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        let mut source = codec.open_response_body_source(&response).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        drop(source);

        assert!(carrier.is_retired());
        assert!(codec.is_response_complete());
        assert!(matches!(
            codec.peek_trailers(),
            Err(ExchangeError::TrailersTruncated)
        ));
    }

    #[test]
    fn malformed_chunk_sizes_are_protocol_errors() {
        let script = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n";
        let (mut codec, carrier, _written, _timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        let mut source = codec.open_response_body_source(&response).unwrap();
        let mut buf = [0u8; 8];
        let err = source.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        drop(source);

        assert!(carrier.is_retired());
        assert!(matches!(
            codec.peek_trailers(),
            Err(ExchangeError::TrailersTruncated)
        ));
    }

    #[test]
    fn chunk_extensions_are_tolerated() {
        let script = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                      5;speed=slow\r\nhello\r\n0\r\n\r\n";
        let (mut codec, carrier, _written, _timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        let mut source = codec.open_response_body_source(&response).unwrap();
        let mut body = String::new();
        source.read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");
        drop(source);
        assert!(!carrier.is_retired());
    }

    #[test]
    fn switching_protocols_is_a_final_response() {
        let script = "HTTP/1.1 101 Switching Protocols\r\n\r\n";
        let (mut codec, _carrier, _written, _timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        assert_eq!(response.code, 101);
        // 101 opened the response body phase rather than looping for more
        // header blocks.
        let _ = codec.open_response_body_source(&response).unwrap();
    }

    #[test]
    fn connect_responses_with_a_body_are_skimmed() {
        let script = "HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc";
        let (mut codec, carrier, _written, _timeouts) = codec_for(script);

        let response = codec.read_response_headers(false).unwrap().unwrap();
        codec.skip_connect_body(&response).unwrap();

        assert!(codec.is_response_complete());
        assert!(!carrier.is_retired());
    }

    #[test]
    fn header_read_at_end_of_stream_reports_the_redacted_url() {
        let (mut codec, carrier, _written, _timeouts) = codec_for("");

        let err = codec.read_response_headers(false).unwrap_err();
        match err {
            ExchangeError::UnexpectedEndOfStream { url } => {
                assert_eq!(url, "http://example.com/...");
            }
            other => panic!("expected UnexpectedEndOfStream, got {other:?}"),
        }
        assert_eq!(carrier.failures().len(), 1);
    }

    #[test]
    fn cancel_delegates_to_the_carrier() {
        let (codec, carrier, _written, _timeouts) = codec_for("");
        codec.cancel();
        assert!(carrier.is_canceled());
    }
}
