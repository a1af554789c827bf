//! Pulseboard Server - Real-time hackathon event board.
//!
//! This crate provides the Pulseboard demo-event server, responsible for:
//! - Managing teams, gigs, mentor bookings, and announcements
//! - Tracking points from check-ins, awards, and judge scores
//! - Broadcasting leaderboard snapshots to WebSocket subscribers
//!
//! # Architecture
//!
//! All state lives in a single in-memory [`store::EventStore`]; nothing is
//! persisted and a restart clears the event. Every mutation that can move the
//! leaderboard recomputes a snapshot and fans it out through the
//! [`broadcast::SubscriberRegistry`] to every connected client. Optionally,
//! a subset of endpoints can be delegated verbatim to an upstream system via
//! [`upstream::UpstreamClient`].

pub mod broadcast;
pub mod config;
pub mod error;
pub mod routes;
pub mod store;
pub mod types;
pub mod upstream;
