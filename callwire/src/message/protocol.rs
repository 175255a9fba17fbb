// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

/// The HTTP protocol version a response was framed with, as reported by its
/// status line. Renders in ALPN style (`http/1.1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Protocol {
    #[strum(serialize = "http/1.0")]
    Http10,
    #[strum(serialize = "http/1.1")]
    Http11,
}
