//! Core mmchat library (sessions, persistence, composer, model gateway, config).

pub mod composer;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod images;
pub mod prompts;
pub mod store;

pub use mmchat_types as types;
