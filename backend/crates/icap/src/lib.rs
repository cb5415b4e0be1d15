//! ICAP/1.0 Protocol Engine
//!
//! - `parser` - request line, ICAP headers, encapsulated HTTP sections, chunked bodies
//! - `response` - OPTIONS / 204 / 200 / error serialization
//! - `server` - connection handling and method dispatch
//! - `handler` - the body transformation contract the server drives
//!
//! ## Failure Policy
//! - Framing errors answer 400, unknown methods 405, before any transform runs
//! - A body the handler cannot process is passed through with 204

pub mod error;
pub mod handler;
pub mod parser;
pub mod response;
pub mod server;

// Re-exports for convenience
pub use error::{IcapError, IcapResult};
pub use handler::{LocalPayloadHandler, PayloadHandler};
pub use server::{IcapConfig, IcapServer};
