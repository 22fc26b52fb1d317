//! Per-room actors: bounded history, presence, and call lifecycle behind a
//! single-threaded command loop.

pub mod actor;
pub mod call;
pub mod commands;
pub mod events;
pub mod presence;
pub mod session;
pub mod socket;
