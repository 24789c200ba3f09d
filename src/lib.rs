//! Logo Preserve detection worker
//!
//! This library implements the queue-side of the logo-preserve system: a
//! worker that consumes detection jobs from RabbitMQ, downloads the source
//! image from object storage, runs logo detection, uploads the extracted
//! regions, and publishes a structured result back onto the results queue.

pub mod broker;
pub mod config;
pub mod delivery;
pub mod models;
pub mod processor;
pub mod services;
pub mod staging;
