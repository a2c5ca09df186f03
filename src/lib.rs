pub mod cli;
pub mod config;
pub mod error;
pub mod instrument;
pub mod transport;

// Re-export the primary types so users can depend on the crate
// without knowing the internal module layout.
pub use error::{ConfigError, Error, Result};
pub use instrument::*;
pub use transport::{Endpoint, SCPI_SOCKET_PORT, ScpiTransport};
