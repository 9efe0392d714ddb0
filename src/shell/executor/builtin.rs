use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use nix::unistd::{access, AccessFlags};

use crate::shell::session::Session;

fn resolve_dir(path: &Path) -> Result<PathBuf, &'static str> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => "No such file or directory",
        ErrorKind::PermissionDenied => "Permission denied",
        _ => "cannot access directory",
    })?;
    if !metadata.is_dir() {
        return Err("Not a directory");
    }
    if access(path, AccessFlags::X_OK).is_err() {
        return Err("Permission denied");
    }
    fs::canonicalize(path).map_err(|_| "cannot resolve directory")
}

/// 改变会话的工作目录，同时更新 `PWD` 与 `OLDPWD`
pub fn cd(session: &mut Session, args: &[String]) -> i32 {
    let mut announce = false;
    let target = match args {
        [] => match session.var("HOME") {
            Some(home) => home.to_string(),
            None => {
                eprintln!("nagare: cd: HOME not set");
                return 1;
            }
        },
        [dir] if dir == "-" => match session.var("OLDPWD") {
            Some(old) => {
                announce = true;
                old.to_string()
            }
            None => {
                eprintln!("nagare: cd: OLDPWD not set");
                return 1;
            }
        },
        [dir] => shellexpand::tilde_with_context(dir, || session.var("HOME")).into_owned(),
        _ => {
            eprintln!("nagare: cd: too many arguments");
            return 1;
        }
    };

    let dir = match resolve_dir(&session.cwd.join(&target)) {
        Ok(dir) => dir,
        Err(reason) => {
            eprintln!("nagare: cd: {}: {}", target, reason);
            return 1;
        }
    };

    debug!("切换工作目录: {} -> {}", session.cwd.display(), dir.display());
    let old = std::mem::replace(&mut session.cwd, dir);
    session.set_var("OLDPWD", old.display().to_string());
    session.set_var("PWD", session.cwd.display().to_string());
    if announce {
        println!("{}", session.cwd.display());
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[allow(clippy::unwrap_used)]
    fn session_in(dir: &Path) -> Session {
        let mut env = HashMap::new();
        env.insert("HOME".to_string(), dir.display().to_string());
        Session::new(dir.canonicalize().unwrap(), env)
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cd_relative_and_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let mut session = session_in(dir.path());
        let root = session.cwd.clone();

        assert_eq!(cd(&mut session, &["sub".to_string()]), 0);
        assert_eq!(session.cwd, root.join("sub"));
        assert_eq!(session.var("PWD"), Some(root.join("sub").to_str().unwrap()));
        assert_eq!(session.var("OLDPWD"), Some(root.to_str().unwrap()));

        assert_eq!(cd(&mut session, &["..".to_string()]), 0);
        assert_eq!(session.cwd, root);

        assert_eq!(cd(&mut session, &["-".to_string()]), 0);
        assert_eq!(session.cwd, root.join("sub"));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cd_home() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("inner")).unwrap();
        let mut session = session_in(dir.path());
        let root = session.cwd.clone();
        session.cwd = root.join("inner");

        assert_eq!(cd(&mut session, &[]), 0);
        assert_eq!(session.cwd, root);
        assert_eq!(cd(&mut session, &["~/inner".to_string()]), 0);
        assert_eq!(session.cwd, root.join("inner"));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cd_failures_keep_cwd() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("file"), "").unwrap();
        let mut session = session_in(dir.path());
        let root = session.cwd.clone();

        assert_eq!(cd(&mut session, &["missing".to_string()]), 1);
        assert_eq!(cd(&mut session, &["file".to_string()]), 1);
        assert_eq!(cd(&mut session, &["a".to_string(), "b".to_string()]), 1);
        assert_eq!(session.cwd, root);
        assert_eq!(session.var("OLDPWD"), None);
    }

    #[test]
    fn test_cd_without_home() {
        let mut session = Session::new("/", HashMap::new());
        assert_eq!(cd(&mut session, &[]), 1);
        assert_eq!(cd(&mut session, &["-".to_string()]), 1);
    }
}
