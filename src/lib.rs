//! brickops - storage node executors for GlusterFS clusters
//!
//! An [`executors::Executor`] turns control plane requests (devices, bricks,
//! volumes, snapshots, block volumes, peers) into work on storage nodes and
//! parses what the nodes answer.

pub mod cli;
pub mod config;
pub mod error;
pub mod executors;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod retry;
pub mod xml;
