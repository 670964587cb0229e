//! Stream source abstraction layer.
//!
//! Provides the `StreamSource` trait and its implementations for serial
//! devices, child process pipes and in-memory mock links, so that the reader
//! loop and the echo bridge can be tested without hardware.

pub mod error;
pub mod mock;
pub mod pipe;
pub mod serial;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use pipe::PipeSource;
pub use serial::SerialSource;
pub use traits::*;
