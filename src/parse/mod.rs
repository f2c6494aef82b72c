pub mod field_format;
pub mod markdown;
pub mod task_parser;
pub mod task_serializer;

pub use field_format::FieldFormat;
pub use markdown::scan_document;
pub use task_parser::{ParseContext, parse_checkbox, parse_task, parse_title_and_tags};
pub use task_serializer::{serialize_task, serialize_task_line};
