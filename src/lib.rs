//! Wi-SUN PAE security state persistence
//!
//! Converts PAE key material, group key frame counters and the key storage
//! index into fixed-layout TLV records for non-volatile storage, and back.

pub mod config;
pub mod nvm;
pub mod security;
