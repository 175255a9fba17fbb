// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Error taxonomy for the scheduler and the HTTP/1.1 exchange codec.
//!
//! Recoverable failures are modeled here with [thiserror] and [miette].
//! Lifecycle misuse of the codec (an operation invoked in the wrong state)
//! is a caller bug, not a recoverable condition, and panics with a
//! `state: <state>` message instead of appearing in these enums.

use std::io;

/// Errors from scheduling work onto a [`TaskQueue`].
///
/// [`TaskQueue`]: crate::scheduler::TaskQueue
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SchedulerError {
    /// A non-cancelable task was scheduled onto a queue that has been shut
    /// down.
    #[error("queue {queue} is shut down")]
    #[diagnostic(
        code(callwire::scheduler::queue_shutdown),
        help(
            "Cancelable tasks scheduled after shutdown are silently dropped; \
             a non-cancelable task after shutdown means the caller lost track \
             of the queue's lifecycle."
        )
    )]
    QueueShutdown {
        /// Runner-assigned name of the queue.
        queue: String,
    },

    /// [`std::thread::Builder::spawn()`] failed for a worker thread.
    #[error("failed to spawn a task runner worker thread")]
    #[diagnostic(
        code(callwire::scheduler::thread_spawn),
        help(
            "The system may have reached its thread limit - \
             check `ulimit -u` for the per-user limit."
        )
    )]
    ThreadSpawn(#[source] io::Error),
}

/// Errors from driving one HTTP/1.1 request/response exchange.
///
/// Protocol variants mean the peer (or an intermediary) broke HTTP/1.1
/// framing; wherever one is raised mid-body, the connection has also been
/// retired from reuse, because the stream position is no longer trustworthy.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ExchangeError {
    /// The status line did not match `HTTP/<major>.<minor> <code> [<reason>]`.
    #[error("unexpected status line: {line}")]
    #[diagnostic(code(callwire::http1::status_line))]
    MalformedStatusLine {
        /// The offending line, as read from the wire.
        line: String,
    },

    /// A chunk-size line was not hexadecimal, or its extensions did not
    /// start with `;`.
    #[error("expected chunk size but was {line:?}")]
    #[diagnostic(code(callwire::http1::chunk_size))]
    MalformedChunkSize {
        /// The offending line, as read from the wire.
        line: String,
    },

    /// The accumulated header block exceeded the byte budget.
    #[error("header block exceeded {limit} bytes")]
    #[diagnostic(
        code(callwire::http1::header_limit),
        help("A well-behaved server stays far below this limit; treat the response as hostile.")
    )]
    HeadersTooLarge {
        /// The budget that was exhausted.
        limit: u64,
    },

    /// The stream ended before the message did.
    #[error("unexpected end of stream on {url}")]
    #[diagnostic(code(callwire::http1::unexpected_eof))]
    UnexpectedEndOfStream {
        /// Redacted URL of the request, for context without leaking paths.
        url: String,
    },

    /// HTTP/1 cannot interleave request and response bodies.
    #[error("duplex request bodies are not supported by HTTP/1")]
    #[diagnostic(code(callwire::http1::duplex_body))]
    DuplexBody,

    /// The response body ended abnormally, so its trailers were lost.
    #[error("the response body ended before its trailers")]
    #[diagnostic(code(callwire::http1::trailers_truncated))]
    TrailersTruncated,

    /// Transport failure reading or writing the socket.
    #[error(transparent)]
    #[diagnostic(code(callwire::http1::io))]
    Io(#[from] io::Error),
}

impl ExchangeError {
    /// True for framing violations by the peer, false for transport-level
    /// failures.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::TrailersTruncated)
    }
}

/// Body sinks and sources speak [`std::io`]; exchange errors raised inside
/// them travel wrapped in an [`io::Error`] whose kind reflects the failure.
impl From<ExchangeError> for io::Error {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Io(io_err) => io_err,
            ExchangeError::UnexpectedEndOfStream { .. } => {
                io::Error::new(io::ErrorKind::UnexpectedEof, err)
            }
            _ => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn protocol_classification() {
        assert!(
            ExchangeError::MalformedStatusLine {
                line: "HTP 200".into()
            }
            .is_protocol()
        );
        assert!(ExchangeError::DuplexBody.is_protocol());
        assert!(!ExchangeError::Io(io::Error::other("boom")).is_protocol());
        assert!(!ExchangeError::TrailersTruncated.is_protocol());
    }

    #[test]
    fn io_conversion_keeps_the_kind() {
        let eof: io::Error = ExchangeError::UnexpectedEndOfStream {
            url: "https://example.com/...".into(),
        }
        .into();
        assert_eq!(eof.kind(), io::ErrorKind::UnexpectedEof);

        let framing: io::Error = ExchangeError::MalformedChunkSize {
            line: "zz".into(),
        }
        .into();
        assert_eq!(framing.kind(), io::ErrorKind::InvalidData);
    }
}
