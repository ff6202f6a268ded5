pub mod net;
pub mod platform;

// Re-exports for convenience
pub use net::{HttpTransport, Transport, TransportError};
