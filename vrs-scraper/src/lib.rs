//! VRS station scraper.
//!
//! Collects the public transport stops of Cologne from the VRS (Verkehrsverbund
//! Rhein-Sieg) search services. Search terms come from one of several
//! sources; every hit is normalised to WGS84, filtered against the city
//! boundary and stored in a persistent SQLite cache, which is finally
//! exported as CSV.

pub mod boundary;
pub mod cache;
pub mod config;
pub mod coords;
pub mod domain;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod qrcodes;
pub mod search;
pub mod terms;
