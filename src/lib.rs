//! # Event Webhook Library
//!
//! This library provides the core functionality for the event webhook service,
//! including ingestion, DynamoDB storage, handlers and server configuration.

pub mod config;
pub mod dynamo;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod repositories;
pub mod server;
pub mod telemetry;
