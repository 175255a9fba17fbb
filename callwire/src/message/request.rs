// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{Headers, HttpUrl, Method};

/// What the codec needs to know about a request body before framing it. The
/// body's bytes stream through the sink the codec hands back; this is only
/// the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestBody {
    duplex: bool,
}

impl RequestBody {
    /// A body that is fully written before the response is read.
    #[must_use]
    pub fn buffered() -> Self { Self { duplex: false } }

    /// A body that is written concurrently with reading the response.
    /// HTTP/1 cannot frame this; the codec rejects it.
    #[must_use]
    pub fn duplex() -> Self { Self { duplex: true } }

    #[must_use]
    pub fn is_duplex(&self) -> bool { self.duplex }
}

/// One HTTP request, headers only; the body streams separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: HttpUrl,
    pub headers: Headers,
    pub body: Option<RequestBody>,
}

impl Request {
    #[must_use]
    pub fn new(method: Method, url: HttpUrl) -> Self {
        Self {
            method,
            url,
            headers: Headers::default(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// The last value of `name`, or `None`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> { self.headers.get(name) }

    /// True if this request declares `Transfer-Encoding: chunked`.
    #[must_use]
    pub fn is_chunked(&self) -> bool { self.headers.is_chunked_transfer() }
}
