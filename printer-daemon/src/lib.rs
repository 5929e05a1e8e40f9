//! Printer daemon: keeps the configured Woosim printer connected, monitors its
//! status and prints test pages on request.

pub mod app;
pub mod background;
pub mod bootstrap;
pub mod config;
pub mod services;
pub mod shutdown;

pub use bootstrap::init_foundation;
