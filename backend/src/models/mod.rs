pub mod finding;
pub mod report;
pub mod scan;

// Re-export commonly used types
pub use finding::*;
pub use report::*;
pub use scan::*;
