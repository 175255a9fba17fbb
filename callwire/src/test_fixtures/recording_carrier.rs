// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A [`Carrier`] that records every call, for asserting connection-reuse
//! discipline, plus a cookie jar that records trailer hand-offs.

use std::sync::{Mutex,
                atomic::{AtomicBool, Ordering}};

use crate::{connection::{Carrier, CookieJar, Route},
            error::ExchangeError,
            message::{Headers, HttpUrl}};

/// Records the codec's calls instead of owning a socket.
#[derive(Debug)]
pub struct RecordingCarrier {
    route: Route,
    no_new_exchanges: AtomicBool,
    canceled: AtomicBool,
    failures: Mutex<Vec<String>>,
}

impl RecordingCarrier {
    #[must_use]
    pub fn new(route: Route) -> Self {
        Self {
            route,
            no_new_exchanges: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// True once the codec retired this connection from reuse.
    #[must_use]
    pub fn is_retired(&self) -> bool { self.no_new_exchanges.load(Ordering::SeqCst) }

    #[must_use]
    pub fn is_canceled(&self) -> bool { self.canceled.load(Ordering::SeqCst) }

    /// Rendered messages of every failure the codec reported.
    #[must_use]
    pub fn failures(&self) -> Vec<String> { self.failures.lock().unwrap().clone() }
}

impl Carrier for RecordingCarrier {
    fn route(&self) -> &Route { &self.route }

    fn track_failure(&self, error: &ExchangeError) {
        self.failures.lock().unwrap().push(error.to_string());
    }

    fn no_new_exchanges(&self) { self.no_new_exchanges.store(true, Ordering::SeqCst); }

    fn cancel(&self) { self.canceled.store(true, Ordering::SeqCst); }
}

/// A [`CookieJar`] that records each trailer hand-off.
#[derive(Debug, Default)]
pub struct RecordingCookieJar {
    saved: Mutex<Vec<(HttpUrl, Headers)>>,
}

impl RecordingCookieJar {
    #[must_use]
    pub fn saved(&self) -> Vec<(HttpUrl, Headers)> { self.saved.lock().unwrap().clone() }
}

impl CookieJar for RecordingCookieJar {
    fn save_from_trailers(&self, url: &HttpUrl, trailers: &Headers) {
        self.saved
            .lock()
            .unwrap()
            .push((url.clone(), trailers.clone()));
    }
}
