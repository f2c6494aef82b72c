pub mod blocks;
pub mod classify;
pub mod forest;
pub mod store;

pub use blocks::{Block, resolve_blocks};
pub use classify::{Bucket, Classification, ClassifyError, ClassifyOptions, Window, classify};
pub use forest::{GraphError, TaskNode, build_forest, cascade, descendants};
pub use store::TaskStore;
