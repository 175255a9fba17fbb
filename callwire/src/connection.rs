// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The seam between one exchange and the connection layer that owns the
//! socket. The codec reports failures and retires connections through
//! [`Carrier`]; it never touches the pool directly.

use crate::{error::ExchangeError,
            message::{Headers, HttpUrl}};

/// How a route reaches the origin server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proxy {
    /// A direct connection; request targets use origin-form.
    Direct,
    /// An HTTP proxy; plaintext request targets use absolute-form.
    Http {
        host: String,
        port: u16,
    },
}

/// The concrete path a connection took: the address it serves and the proxy,
/// if any, in front of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Base URL of the server this connection serves. Used for request-line
    /// form decisions and for redacted error context.
    pub address_url: HttpUrl,
    pub proxy: Proxy,
}

impl Route {
    #[must_use]
    pub fn direct(address_url: HttpUrl) -> Self {
        Self {
            address_url,
            proxy: Proxy::Direct,
        }
    }

    #[must_use]
    pub fn uses_http_proxy(&self) -> bool { matches!(self.proxy, Proxy::Http { .. }) }
}

/// The connection-layer adapter an exchange reports through.
///
/// Implementations own the socket and participate in pool decisions; the
/// codec only ever narrows what the connection may do next.
pub trait Carrier: Send + Sync {
    fn route(&self) -> &Route;

    /// Record a failure observed on this connection, for the pool's health
    /// accounting.
    fn track_failure(&self, error: &ExchangeError);

    /// Retire this connection: it must not host any further exchanges. Called
    /// when framing became untrustworthy (truncated or unknown-length body).
    fn no_new_exchanges(&self);

    /// Abort the underlying socket. Safe to call from any thread.
    fn cancel(&self);
}

/// Receives trailer headers, exactly as response headers are handed to
/// cookies upstream of the codec.
pub trait CookieJar: Send + Sync {
    fn save_from_trailers(&self, url: &HttpUrl, trailers: &Headers);
}

/// A jar that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCookieJar;

impl CookieJar for NoCookieJar {
    fn save_from_trailers(&self, _url: &HttpUrl, _trailers: &Headers) {}
}
