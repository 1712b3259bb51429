pub mod alerts;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod notify;
pub mod report;
pub mod rotation;
pub mod signals;
pub mod storage;
