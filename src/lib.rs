//! Club Enrollment - Payment-gated club memberships and event registrations
//!
//! This crate orchestrates the enrollment transaction: turning a member's
//! request to join a club or register for an event into exactly one paid
//! (or free) enrollment, coordinated across the client, an external payment
//! gateway and the enrollment store.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
