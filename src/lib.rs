pub mod app;
pub mod catalog;
pub mod config;
pub mod lease;
pub mod orchestration;
pub mod runtime;
pub mod shared;
pub mod store;
