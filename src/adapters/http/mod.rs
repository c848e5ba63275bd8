//! HTTP adapters - REST API implementations.

pub mod enrollment;

pub use enrollment::{enrollment_router, EnrollmentAppState};
