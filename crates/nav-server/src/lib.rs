//! Route monitoring and autonomous replanning server.

pub mod alerts;
pub mod api;
pub mod backoff;
pub mod config;
pub mod controller;
pub mod monitor;
pub mod persistence;
pub mod replanner;
pub mod sensors;
