//! Infrastructure layer: external integrations.
//!
//! Holds everything that talks to the outside world, kept behind the domain
//! layer's trait seams so the rest of the crate stays testable in isolation.

pub mod backend;
