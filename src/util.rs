use std::sync::LazyLock;

use regex::Regex;
use tracing::level_filters::LevelFilter;

const CONFIG_PATH: &str = "WINSVC_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./winservice.json";

pub fn get_config_path() -> String {
    std::env::var(CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

const LOG_LEVEL: &str = "WINSVC_LOG_LEVEL";

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::DEBUG;

pub fn get_log_level() -> LevelFilter {
    let level_from_env = std::env::var(LOG_LEVEL);
    level_from_env.map_or(DEFAULT_LOG_LEVEL, |res| {
        res.parse().unwrap_or(DEFAULT_LOG_LEVEL)
    })
}

static INVALID_ID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9\-_,.$() ]").unwrap_or_else(|e| panic!("invalid id pattern: {e}"))
});

static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").unwrap_or_else(|e| panic!("invalid id pattern: {e}")));

/// Turn an arbitrary name into a stable component identifier.
///
/// Characters outside `[A-Za-z0-9-_,.$() ]` become `_`, repeated underscores
/// collapse to one and leading/trailing underscores are dropped. The same
/// input always yields the same id, which keeps alert deduplication stable
/// across polls.
pub fn prep_id(name: &str) -> String {
    let replaced = INVALID_ID_CHARS.replace_all(name, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        "-".to_string()
    } else {
        trimmed.to_string()
    }
}
