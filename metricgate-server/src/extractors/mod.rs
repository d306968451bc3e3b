//! Request extractors shared by the endpoints.

mod caller;
mod content_type;
mod received_at;

pub use self::caller::*;
pub use self::content_type::*;
pub use self::received_at::*;
