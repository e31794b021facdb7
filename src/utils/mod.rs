pub mod collection_ext;
pub mod error;
pub mod string_ext;

pub use collection_ext::{group_by, unique_ordered};
pub use error::{ApiError, ApiResult};
pub use string_ext::{actor_key, clean_optional_string};
