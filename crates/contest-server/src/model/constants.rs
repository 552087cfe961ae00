//! Configuration keys and defaults

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";

/// Environment variables `CONTEST_<SECTION>__<KEY>` map to `<section>.<key>`
pub const ENV_PREFIX: &str = "CONTEST";
pub const ENV_PREFIX_SEPARATOR: &str = "_";
pub const ENV_SEPARATOR: &str = "__";

pub const STORAGE_MODE: &str = "storage.mode";
pub const STORAGE_PATH: &str = "storage.path";
pub const COMPACT_THRESHOLD: &str = "storage.compact_threshold";
pub const LOCK_TIMEOUT_MS: &str = "lock.timeout_ms";
pub const TITLE_MAX_LEN: &str = "validation.title_max_len";
pub const MEDIA_REF_MAX_LEN: &str = "validation.media_ref_max_len";
pub const LOGS_PATH: &str = "logs.path";
pub const LOGS_LEVEL: &str = "logs.level";
pub const LOGS_CONSOLE: &str = "logs.console";
pub const LOGS_FILE: &str = "logs.file";
pub const LOGS_ROTATION: &str = "logs.rotation";

pub const DEFAULT_LOG_LEVEL: &str = "warn";
