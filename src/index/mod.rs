pub mod builder;
pub mod refresher;

pub use builder::{build, validate_templates, FileEntry, GridIndex, IndexError, RowView};
pub use refresher::GridState;
