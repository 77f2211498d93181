// Library exports for capectl

pub mod app;
pub mod codec;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod library;
pub mod listen;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod state;
pub mod widgets;
pub mod worker;

// Re-export commonly used types
pub use error::{CapeError, DecodeError, ProviderError};
pub use library::{Library, LibraryEvent};
pub use model::{Cape, CapeMetadata, Cursor};
