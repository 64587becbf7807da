//! Library crate for sockcheck: acquire a socket list, test every socket, report.
pub mod cache;
pub mod checker;
pub mod config;
pub mod logging;
pub mod report;
pub mod runner;
pub mod sockets;
pub mod source;
pub mod types;
