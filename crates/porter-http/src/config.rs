use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub default_page_size: usize,
    pub default_page_number: usize,
    pub export_chunk_size: usize,
    pub export_filename: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_page_size: 15,
            default_page_number: 1,
            export_chunk_size: crate::export::EXPORT_CHUNK_SIZE,
            export_filename: "export".into(),
        }
    }
}

impl GatewayConfig {
    /// Defaults overlaid with `PORTER_DEFAULT_PAGE_SIZE` and
    /// `PORTER_EXPORT_CHUNK_SIZE`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = env_usize("PORTER_DEFAULT_PAGE_SIZE") {
            config.default_page_size = size;
        }
        if let Some(size) = env_usize("PORTER_EXPORT_CHUNK_SIZE") {
            config.export_chunk_size = size;
        }
        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
}
