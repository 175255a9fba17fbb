// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Per-operation deadlines on the byte stream under an exchange.
//!
//! The codec scopes deadlines to the operation that needs them: the
//! early-close body drain and the CONNECT body skim install a short read
//! deadline for their duration only, and every body sink/source resets the
//! deadline it touched when it finishes. Nothing per-exchange may leak into
//! the next exchange on a pooled socket.

use std::{io, net::TcpStream, time::Duration};

/// Deadline control for the socket an exchange runs over.
///
/// `None` restores the connection's default (no per-operation deadline).
pub trait SocketTimeouts: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the underlying socket rejects the deadline.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// # Errors
    ///
    /// Returns an error if the underlying socket rejects the deadline.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl SocketTimeouts for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}
