// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Reusable fixtures for testing the scheduler and the codec: a scripted
//! in-memory socket, recording carrier and cookie jar, and a virtual-time
//! scheduler backend. Public so downstream crates can test against the same
//! seams.

// Attach sources.
pub mod fake_clock_backend;
pub mod mock_socket;
pub mod recording_carrier;

// Re-export.
pub use fake_clock_backend::*;
pub use mock_socket::*;
pub use recording_carrier::*;
