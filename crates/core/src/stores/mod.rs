pub mod memory;
pub mod opensearch;

pub use memory::InMemoryIndex;
pub use opensearch::{CourseIndices, OpenSearchStore};
