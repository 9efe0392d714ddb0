use std::path::Path;

/// 提示符中显示的目录，家目录下的部分缩写为 `~`
pub fn tilde_path(path: &Path, home: Option<&str>) -> String {
    let Some(home) = home.filter(|home| !home.is_empty() && *home != "/") else {
        return path.display().to_string();
    };
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}
