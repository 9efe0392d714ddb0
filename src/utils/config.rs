use dotenv::dotenv;
use log::warn;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
}

impl Config {
    fn get_config_dir(home: Option<String>) -> PathBuf {
        match home {
            Some(home) => PathBuf::from(home).join(".config/nagare"),
            None => env::temp_dir().join("nagare"),
        }
    }

    fn with_defaults(config_dir: PathBuf) -> Self {
        Config {
            name: String::from("nagare"),
            theme: String::from("default"),
            history_file: config_dir.join(".nagare_history"),
            editor_mode: String::from("vi"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
            config_dir,
        }
    }

    /// 从任意变量来源构建配置，未设置的项使用默认值
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::with_defaults(Self::get_config_dir(lookup("HOME")));

        if let Some(theme) = lookup("NAGARE_THEME") {
            config.theme = theme;
        }
        if let Some(editor) = lookup("NAGARE_EDITOR") {
            config.editor_mode = editor;
        }
        if let Some(history) = lookup("NAGARE_HISTORY") {
            config.history_file = PathBuf::from(history);
        }
        if let Some(level) = lookup("NAGARE_LOG_LEVEL") {
            config.logger_level = level;
        }
        if let Some(dir) = lookup("NAGARE_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn new() -> Self {
        // 优先加载环境变量
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let config = Self::from_lookup(|name| env::var(name).ok());

        // 确保历史文件目录存在
        if let Some(parent) = config.history_file.parent() {
            ensure_dir(parent);
        }
        ensure_dir(&config.logger_dir);

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "emacs" => EditMode::Emacs,
            _ => EditMode::Vi,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_dir(dir: &Path) {
    if let Err(e) = fs::create_dir_all(dir) {
        warn!("无法创建目录 {}: {}", dir.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("HOME", "/home/nagi")]);
        assert_eq!(config.name, "nagare");
        assert_eq!(config.theme, "default");
        assert_eq!(config.logger_level, "warn");
        assert_eq!(
            config.history_file,
            PathBuf::from("/home/nagi/.config/nagare/.nagare_history")
        );
        assert_eq!(
            config.logger_dir,
            PathBuf::from("/home/nagi/.config/nagare/logs")
        );
        assert_eq!(config.get_edit_mode(), EditMode::Vi);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("NAGARE_THEME", "dark"),
            ("NAGARE_EDITOR", "Emacs"),
            ("NAGARE_HISTORY", "/tmp/h"),
            ("NAGARE_LOG_LEVEL", "debug"),
            ("NAGARE_LOG_DIR", "/tmp/logs"),
        ]);
        assert_eq!(config.theme, "dark");
        assert_eq!(config.get_edit_mode(), EditMode::Emacs);
        assert_eq!(config.history_file, PathBuf::from("/tmp/h"));
        assert_eq!(config.logger_level, "debug");
        assert_eq!(config.logger_dir, PathBuf::from("/tmp/logs"));
        assert!(config.config_dir.ends_with("nagare"));
    }
}
