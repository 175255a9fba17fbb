// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A pre-parsed HTTP URL value. Parsing URLs is the caller's concern; this
//! type only renders the forms the wire needs.

use std::fmt;

/// URL scheme. Renders lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// An already-parsed `http` or `https` URL.
///
/// `path` and `query` are stored in their encoded wire form; this type never
/// decodes or re-encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpUrl {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: Option<String>,
}

impl HttpUrl {
    #[must_use]
    pub fn new(scheme: Scheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            port: scheme.default_port(),
            path: "/".into(),
            query: None,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn is_https(&self) -> bool { self.scheme == Scheme::Https }

    /// The origin-form request target: encoded path (at least `/`) plus the
    /// encoded query, if any.
    #[must_use]
    pub fn request_target(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        match &self.query {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        }
    }

    /// The absolute-form of this URL, used as the request target on routes
    /// through an HTTP proxy.
    #[must_use]
    pub fn to_absolute_form(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority(), self.request_target())
    }

    /// This URL with the path, query, and any credentials removed: safe for
    /// logs and error messages.
    #[must_use]
    pub fn redact(&self) -> String {
        format!("{}://{}/...", self.scheme, self.authority())
    }

    fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_absolute_form())
    }
}
