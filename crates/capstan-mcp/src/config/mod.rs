//! Configuration loading and resolution.

use capstan::DEFAULT_PAGE_SIZE;

use crate::types::{SERVER_NAME, SERVER_VERSION};

/// Environment variable overriding the listing page size.
pub const PAGE_SIZE_ENV: &str = "CAPSTAN_PAGE_SIZE";

/// Default listen address for the HTTP transport.
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:3100";

/// Runtime settings for one server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub page_size: usize,
    pub server_name: String,
    pub server_version: String,
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            server_name: SERVER_NAME.to_string(),
            server_version: SERVER_VERSION.to_string(),
            instructions: None,
        }
    }
}

impl ServerConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// Resolve the page size: explicit flag, then `CAPSTAN_PAGE_SIZE`, then the default.
pub fn resolve_page_size(explicit: Option<usize>) -> usize {
    if let Some(size) = explicit.filter(|s| *s > 0) {
        return size;
    }

    let from_env = std::env::var(PAGE_SIZE_ENV).ok();
    parse_page_size(from_env.as_deref()).unwrap_or(DEFAULT_PAGE_SIZE)
}

fn parse_page_size(raw: Option<&str>) -> Option<usize> {
    let raw = raw?;
    match raw.trim().parse::<usize>() {
        Ok(size) if size > 0 => Some(size),
        _ => {
            tracing::warn!("Ignoring invalid {PAGE_SIZE_ENV}={raw:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_flag_wins() {
        assert_eq!(resolve_page_size(Some(7)), 7);
    }

    #[test]
    fn test_env_value_parsing() {
        assert_eq!(parse_page_size(Some("25")), Some(25));
        assert_eq!(parse_page_size(Some(" 10 ")), Some(10));
        assert_eq!(parse_page_size(Some("0")), None);
        assert_eq!(parse_page_size(Some("lots")), None);
        assert_eq!(parse_page_size(None), None);
    }

    #[test]
    fn test_zero_page_size_falls_back() {
        let config = ServerConfig::default().with_page_size(0);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }
}
