pub mod backend;
pub mod config;
pub mod error;
pub mod handle;
pub mod mirror;
pub mod reconciler;

pub use error::{CommandError, MirrorError, MirrorResult};
