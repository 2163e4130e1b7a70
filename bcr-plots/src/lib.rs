//! Plot records for blue carbon field monitoring.
//!
//! A plot is one monitored site: an identifier, a GPS position, a fixed set
//! of soil, water, vegetation and flux measurements, and the year it was
//! monitored. This crate owns the canonical [`plot::PlotRecord`] shape and the
//! [`normalize::Normalizer`] that turns loosely typed CSV rows into it.
//!
//! Malformed fields never fail a row: numbers fall back to NaN, years and
//! timestamps to `None`, GPS positions to [`plot::Location::Invalid`].

pub mod error;
pub mod normalize;
pub mod plot;
pub mod raw;
pub mod source;
