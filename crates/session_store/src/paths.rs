use std::path::{Path, PathBuf};

/// Directory, relative to the working directory, holding persisted chat data.
pub const DATA_DIR: &str = ".agent-chat";

/// JSON document holding every storage key.
pub const DATA_FILE_NAME: &str = "data.json";

#[must_use]
pub fn data_root(cwd: &Path) -> PathBuf {
    cwd.join(DATA_DIR)
}

#[must_use]
pub fn data_file(root: &Path) -> PathBuf {
    root.join(DATA_FILE_NAME)
}

/// Sibling path used for atomic replacement of `path`.
#[must_use]
pub fn temp_file_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
