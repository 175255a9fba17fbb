// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! # callwire
//!
//! The two load-bearing cores of an HTTP/1.1 client, as a library:
//!
//! 1. **Task scheduler** ([`scheduler`]) - a shared, in-process scheduler
//!    that multiplexes many logical [`TaskQueue`]s over on-demand worker
//!    threads. Delayed execution, strict per-queue ordering, cancellation,
//!    and a single-coordinator timed-wait protocol, all decided under one
//!    lock while task bodies run outside it. The [`Backend`] seam abstracts
//!    time, waiting, and thread creation, so the whole scheduler runs under
//!    a virtual clock in tests (see [`test_fixtures::FakeClockBackend`]).
//!
//! 2. **HTTP/1.1 exchange codec** ([`http1`]) - a strict state machine that
//!    writes one request and reads one response over a reusable socket:
//!    known-length and chunked request bodies, fixed-length, chunked, and
//!    until-end-of-stream response bodies, trailers, interim (1xx)
//!    responses including `100 Continue` and `103 Early Hints`, and the
//!    connection-reuse discipline that keeps a pooled socket trustworthy.
//!    Anything that makes the stream position ambiguous retires the
//!    connection through the [`Carrier`] seam.
//!
//! Both cores live here because they fail the same way: a scheduling race
//! or an out-of-order socket operation corrupts shared state that outlives
//! the current call. The types in this crate are built so the compiler
//! enforces most of that discipline - body sinks and sources borrow the
//! codec mutably, making each exchange linear by construction.
//!
//! The surrounding client (URLs, TLS, DNS, pooling, retries, cookies) is
//! out of scope; this crate only defines the seams it talks through
//! ([`Carrier`], [`CookieJar`], [`SocketTimeouts`]).

// Attach sources.
pub mod connection;
pub mod error;
pub mod http1;
pub mod message;
pub mod scheduler;
pub mod socket_io;
pub mod test_fixtures;

// Re-export.
pub use connection::*;
pub use error::*;
pub use http1::*;
pub use message::*;
pub use scheduler::*;
pub use socket_io::*;
