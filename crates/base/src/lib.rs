pub mod consts;

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use directories::ProjectDirs;

pub const PROJECT_NAME: &str = "sbom-operator";
pub const PROJECT_NAME_WITH_INITIAL_CAPITAL: &str = "SBOM Operator";

pub const CLI_PROGRAM_NAME: &str = "sbom-operator";
pub const CLI_CONFIG_NAME: &str = "config.yaml";

pub static PROJECT_CONFIG_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    ProjectDirs::from("", PROJECT_NAME, PROJECT_NAME)
        .expect("Creating `ProjectDirs` should always success")
        .config_dir()
        .to_path_buf()
});

#[must_use]
pub fn fallback_project_config_directories() -> Vec<PathBuf> {
    let mut directories = vec![PathBuf::from("/etc").join(PROJECT_NAME)];
    if let Some(user_dirs) = directories::UserDirs::new() {
        directories.push(
            [user_dirs.home_dir(), Path::new(".config"), Path::new(PROJECT_NAME)].iter().collect(),
        );
    }
    directories
}
