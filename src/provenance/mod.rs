//! Provenance: module fingerprints and the lifecycle event log.

pub mod eventlog;
pub mod hasher;
