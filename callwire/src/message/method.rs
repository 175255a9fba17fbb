// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

/// An HTTP request method. Renders uppercase on the wire.
#[derive(Debug,
         Clone,
         Copy,
         PartialEq,
         Eq,
         strum_macros::Display,
         strum_macros::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    /// CONNECT establishes a tunnel; its response never carries a body worth
    /// reading, and its request line is formed by the tunnel layer.
    #[must_use]
    pub fn is_connect(self) -> bool { self == Self::Connect }
}
