pub mod assemble;
pub mod model;

pub use assemble::{PreviewType, assemble};
pub use model::{Article, Location, Picture, Preview, PreviewKind, Status};
