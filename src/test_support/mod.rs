//! Helpers shared by unit tests.

pub mod scripted;
pub mod socket_guard;
