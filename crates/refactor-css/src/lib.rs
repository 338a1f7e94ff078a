//! refactor-css - Language server that highlights repeated class attribute
//! combinations
//!
//! This library exposes the server pieces for testing and embedding:
//! - [`config`]: settings sent by the client
//! - [`engine`]: the workspace index and everything that updates it
//! - [`debounce`]: per-document rebuild scheduling
//! - [`watcher`]: file system watching for changes made outside the editor
//! - [`lsp`]: the tower-lsp backend

pub mod config;
pub mod debounce;
pub mod engine;
pub mod lsp;
pub mod watcher;

pub use config::Config;
pub use engine::{Decorations, Engine, IndexReport};
