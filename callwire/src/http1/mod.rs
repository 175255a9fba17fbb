// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The HTTP/1.1 wire codec: request/status lines, bounded header reading,
//! and the single-exchange state machine with its body sinks and sources.

// Attach sources.
pub mod exchange_codec;
pub mod headers_reader;
pub mod request_line;
pub mod status_line;

// Re-export.
pub use exchange_codec::*;
pub use headers_reader::*;
pub use request_line::*;
pub use status_line::*;
