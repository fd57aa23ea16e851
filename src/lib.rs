//! Client side of a pre-launch waitlist: validates and submits signups (and
//! partner inquiries) to the backend, and keeps the displayed subscriber count
//! in sync with it.
//!
//! The presentation layer owns everything visual; it drives a
//! `WaitlistClient` and renders whatever state and count it exposes.

pub mod configuration;
pub mod count;
pub mod domain;
pub mod partner_client;
pub mod submission;
pub mod telemetry;
pub mod transport;
pub mod utils;
pub mod waitlist_client;
