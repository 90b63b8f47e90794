//! Collection progress tracker: a location → habitat → sub-category → item
//! catalog laid out as a row-merged table, with persisted "collected" flags,
//! bottom-up completion and collapsible headers.

pub mod collapse;
pub mod completion;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod logging;
pub mod model;
pub mod render;
pub mod session;
pub mod slug;
pub mod store;
pub mod surface;
pub mod wildtext;

pub use error::{Result, TrackerError};
