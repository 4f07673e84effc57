use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "demo-typer";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn settings_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|proj_dirs| proj_dirs.config_dir().join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("demo_typer_settings.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_is_json() {
        let path = AppDirs::settings_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
    }
}
