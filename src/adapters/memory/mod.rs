pub mod graph;
pub mod store;

pub use graph::SourceGraph;
pub use store::{MemoryStore, ProjectData};
