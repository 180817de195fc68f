pub const BAD_CREDENTIALS: &str = "BAD_CREDENTIALS";
pub const EXCHANGE_FAILED: &str = "EXCHANGE_FAILED";
pub const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";
pub const PROVIDER_REQUEST_FAILED: &str = "PROVIDER_REQUEST_FAILED";
