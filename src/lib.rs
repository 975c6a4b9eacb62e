//! amprobe - ammeter emulation and test-campaign library.
//!
//! This library provides the core functionality shared between:
//! - `amprobed` - daemon emulating the three ammeter devices over TCP
//! - `amprobe` - CLI for running sampling campaigns, comparisons and reports

pub mod analysis;
pub mod client;
pub mod collector;
pub mod compare;
pub mod device;
pub mod fault;
pub mod runner;
pub mod storage;
pub mod util;
