//! # APRS Gateway Library
//!
//! Routing core of an APRS IGate, digipeater, tracker and weather station.
//!
//! Frames heard on RF (through a KISS modem), lines read from APRS-IS and
//! frames from a local TNC are classified, recorded in the heard-station and
//! telemetry tables, and republished through a transmit queue according to
//! the enabled roles. The core is synchronous and takes time as a [`clock::Clock`]
//! argument; the binary drives it from a tokio event loop.

pub mod aprs;
pub mod aprsis;
pub mod beacon;
pub mod bridge;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod kiss;
pub mod queue;
pub mod router;
pub mod serial;
pub mod station;
