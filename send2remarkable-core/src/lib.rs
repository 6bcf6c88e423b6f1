#![doc = "send2remarkable-core: core logic library for send2remarkable."]

//! This crate contains the pipeline that takes a BibTeX bibliography to a
//! reMarkable document folder: parsing, attachment resolution, transfer
//! through an external upload client, and local export.
//! The process-spawning upload client lives in the binary crate.
//!
//! # Usage
//! Add this as a dependency for all shared pipeline, config, and sync code.

pub mod bibliography;
pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod resolve;
pub mod synchronise;
pub mod transfer;
