//! Backend implementations: an in-process store and the hosted REST service.

pub mod memory;
pub mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;
