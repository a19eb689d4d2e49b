pub mod config;
pub mod credentials;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod summary;
