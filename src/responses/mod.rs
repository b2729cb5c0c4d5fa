pub mod errors;
pub mod file;
pub mod json;

pub use errors::{error_response, ResultResp};
pub use file::file_response;
pub use json::{json_response, json_status};
