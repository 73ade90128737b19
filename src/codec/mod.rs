//! # Coordinate and Telemetry Codec
//!
//! Stateless encoders used to build beacons and to read positions out of
//! heard packets.
//!
//! This module handles:
//! - Base-91 numerals (plain and semicircle-scaled)
//! - `DDMM.mm` coordinates and the 13-byte compressed position block
//! - Mic-E destination/information encoding
//! - Base-91 telemetry blocks
//! - Great-circle distance and bearing

pub mod base91;
pub mod geo;
pub mod mic_e;
pub mod position;
pub mod telemetry;
