//! Chime gateway — CLI, configuration, HTTP submission API, and the
//! concrete dispatcher transports wired around the scheduling engine.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod dispatch;
pub mod state;
