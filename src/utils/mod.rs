pub mod url_validation;
pub use url_validation::{UrlValidationError, host_header, validate_endpoint_url, with_model};
