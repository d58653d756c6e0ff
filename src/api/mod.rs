mod cookie;
mod error;
mod handler;
mod router;

pub use cookie::{CookiePolicy, REFRESH_COOKIE_NAME};
pub use error::{ApiError, ApiErrorCode, recover_error};
pub use handler::{ApiResponse, RefreshContext, RefreshResponse};
pub use router::routes;
