//! Configuration-backed repositories.

pub mod enclave;
pub mod environment;

pub use enclave::EnclaveRegistry;
pub use environment::EnvironmentRepo;
