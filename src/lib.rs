pub mod compactor;
pub mod config;
pub mod engine;
pub mod guard;
pub mod http;
pub mod limits;
pub mod model;
pub mod observability;
pub mod service;
pub mod tenant;
pub mod wal;
