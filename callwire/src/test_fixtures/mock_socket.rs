// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! An in-memory socket for codec tests: the server's bytes are scripted up
//! front, the client's bytes are captured, and deadline changes are
//! recorded.

use std::{io::{self, Cursor, Write},
          sync::{Arc, Mutex},
          time::Duration};

use crate::socket_io::SocketTimeouts;

/// The two halves of a scripted socket plus its recorded deadlines.
///
/// Destructure it and hand `reader`/`writer` to the codec:
///
/// ```
/// use callwire::test_fixtures::{MockSocket, mock_socket};
///
/// let MockSocket { reader, writer, written, timeouts } =
///     mock_socket("HTTP/1.1 204 No Content\r\n\r\n");
/// # let _ = (reader, writer, written, timeouts);
/// ```
#[derive(Debug)]
pub struct MockSocket {
    /// Yields the scripted server bytes, then end-of-stream.
    pub reader: Cursor<Vec<u8>>,
    /// Captures everything the client writes.
    pub writer: SharedWriter,
    /// View of the captured client bytes.
    pub written: WrittenBytes,
    /// Records every deadline change the codec makes.
    pub timeouts: Arc<RecordedTimeouts>,
}

/// Build a [`MockSocket`] whose server side will deliver `server_script`.
#[must_use]
pub fn mock_socket(server_script: impl Into<Vec<u8>>) -> MockSocket {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    MockSocket {
        reader: Cursor::new(server_script.into()),
        writer: SharedWriter {
            buffer: buffer.clone(),
        },
        written: WrittenBytes { buffer },
        timeouts: Arc::new(RecordedTimeouts::default()),
    }
}

/// Write half of a [`MockSocket`]; clones append to the same capture buffer.
#[derive(Debug, Clone)]
pub struct SharedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

/// Read-side view of the bytes a [`SharedWriter`] captured.
#[derive(Debug, Clone)]
pub struct WrittenBytes {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl WrittenBytes {
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> { self.buffer.lock().unwrap().clone() }

    #[must_use]
    pub fn utf8(&self) -> String { String::from_utf8_lossy(&self.bytes()).into_owned() }
}

/// Records every read/write deadline installed on the socket, in order.
#[derive(Debug, Default)]
pub struct RecordedTimeouts {
    read_timeouts: Mutex<Vec<Option<Duration>>>,
    write_timeouts: Mutex<Vec<Option<Duration>>>,
}

impl RecordedTimeouts {
    #[must_use]
    pub fn read_timeouts(&self) -> Vec<Option<Duration>> {
        self.read_timeouts.lock().unwrap().clone()
    }

    #[must_use]
    pub fn write_timeouts(&self) -> Vec<Option<Duration>> {
        self.write_timeouts.lock().unwrap().clone()
    }
}

impl SocketTimeouts for RecordedTimeouts {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.read_timeouts.lock().unwrap().push(timeout);
        Ok(())
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.write_timeouts.lock().unwrap().push(timeout);
        Ok(())
    }
}
