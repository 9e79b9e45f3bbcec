use dirs::home_dir;
use std::path::PathBuf;

/// Name of the file holding the configuration fingerprint inside a target directory.
pub const FINGERPRINT_FILE: &str = ".feedflow.sha256";

/// Prefix of the hidden staging directories created during extraction.
pub const STAGING_PREFIX: &str = ".feedflow-staging-";

/// Returns the feedflow home directory, or None if the user's home cannot be resolved.
pub fn try_feedflow_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("FEEDFLOW_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".feedflow"))
}

/// Download cache: ~/.feedflow/packages
pub fn cache_path() -> Option<PathBuf> {
    try_feedflow_home().map(|h| h.join("packages"))
}
