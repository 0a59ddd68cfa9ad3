//! Grid geometry: the configuration, the rectangles it produces and the mapping between
//! display space and natural (full-resolution) space.

mod components;
mod config;
mod mapper;

pub use components::*;
pub use config::*;
pub use mapper::*;

use crate::GridError;
use tracing::*;
