pub mod http;
pub mod traits;

pub use http::HttpLogDirectory;
pub use traits::{DirectoryError, LogDirectory, LogFileDescriptor, RawChunk};
