pub mod config;
mod error;
mod id;
pub mod marker;
pub mod media;
pub mod timeline;
pub mod undo;

use std::pin::Pin;

use futures::Stream;

pub use self::config::ProjectConfig;
pub use self::error::{Error, LoadError, Result};
pub use cutline_core::{FrameRate, FrameTime};

pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;
