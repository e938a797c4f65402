pub mod matcher;
pub mod value;

pub use matcher::{CompiledTemplate, FieldTypes, MatchError, TemplateError};
pub use value::{FieldType, FieldValue};
