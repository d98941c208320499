//! `/version`: the plain-text server version.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn handle() -> &'static str { VERSION }
