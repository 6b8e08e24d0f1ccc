pub mod comments;
pub mod config;
mod error;
pub mod events;
pub mod extractor;
pub mod fetch;
pub mod formats;
mod html;
pub mod login;
pub mod media;
pub mod page;
pub mod paginate;
pub mod paths;
pub mod urls;

pub use error::{EngineError, Result};
