pub const OK_RESPONSE: &str = "HTTP/1.1 200 OK";
pub const CREATED: &str = "HTTP/1.1 201 Created\r\nLocation: /api/v1/bank-accounts";
pub const NO_CONTENT: &str = "HTTP/1.1 204 No Content";
pub const BAD_REQUEST: &str = "HTTP/1.1 400 Bad Request";
pub const NOT_FOUND: &str = "HTTP/1.1 404 NOT FOUND";
pub const CONFLICT: &str = "HTTP/1.1 409 Conflict";
pub const INTERNAL_ERROR: &str = "HTTP/1.1 500 INTERNAL ERROR";

pub const API_PREFIX: &str = "/api/v1/bank-accounts";
