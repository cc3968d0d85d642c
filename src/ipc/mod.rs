// src/ipc/mod.rs

//! Client/daemon communication.
//!
//! - [`protocol`] defines the `Request` / `Response` wire types.
//! - [`router`] applies a request to the scheduler and builds the response.
//! - [`server`] is the daemon's Unix-socket listener.
//! - [`client`] sends requests and auto-starts the daemon.

pub mod client;
pub mod protocol;
pub mod router;
pub mod server;

pub use client::{Client, ensure_daemon};
pub use protocol::{Request, Response};
pub use router::{Routed, route_request};
pub use server::Server;
