//! Runtime modes.
//!
//! - `chat`: line-based interactive loop
//! - `markdown`: model markup to terminal text
//! - `render`: plain-text output shared by every command

pub mod chat;
pub mod markdown;
pub mod render;
