//! Key-value REST operations

mod execute;
mod filter;
mod list;
mod settings;

pub use execute::KV_MEDIA_TYPE;
pub use execute::KVSET_MEDIA_TYPE;
pub use execute::PROBLEM_MEDIA_TYPE;
pub use filter::*;
pub use list::*;
