pub mod analytics;
pub mod batch;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod normalize;
pub mod pending;
pub mod pipeline;
pub mod prefs;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod storage;
pub mod store;
pub mod table;
pub mod tracker;
pub mod util;
