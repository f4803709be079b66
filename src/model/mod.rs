//! Request-side data models: regions and labeled annotations.

mod annotation;
mod region;

pub use annotation::{Annotation, parse_annotations};
pub use region::{MIN_POLYGON_VERTICES, Region};
