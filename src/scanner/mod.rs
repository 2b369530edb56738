pub mod charset;
pub mod entities;
pub mod head;
pub mod tag;

pub use entities::resolve_entities;
pub use head::{DEFAULT_MAX_HEAD_BYTES, HeadState, MetaEntry, ScanBuffer};
