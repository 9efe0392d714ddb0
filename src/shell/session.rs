use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use log::warn;

use super::job_manager::JobManager;

/// 只保留名字和值都是 UTF-8 的变量，其余的记录日志后跳过
fn utf8_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
            (Ok(name), Ok(value)) => Some((name, value)),
            (name, _) => {
                warn!("跳过非 UTF-8 环境变量: {:?}", name);
                None
            }
        })
        .collect()
}

/// 一次交互会话的全部可变状态，显式传入每一次执行
#[derive(Debug)]
pub struct Session {
    pub cwd: PathBuf,
    env: HashMap<String, String>,
    pub background_jobs: JobManager,
    /// 交互模式下启动后台任务时打印 `[n] pid`
    pub interactive: bool,
    pub last_status: i32,
}

impl Session {
    pub fn new(cwd: impl Into<PathBuf>, env: HashMap<String, String>) -> Self {
        Self {
            cwd: cwd.into(),
            env,
            background_jobs: JobManager::new(),
            interactive: false,
            last_status: 0,
        }
    }

    /// 以当前进程的环境变量和工作目录创建会话
    pub fn from_process() -> io::Result<Self> {
        let cwd = env::current_dir()?;
        let mut vars = utf8_vars(env::vars_os());
        vars.insert("PWD".to_string(), cwd.display().to_string());
        Ok(Self::new(cwd, vars))
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
    }

    pub fn remove_var(&mut self, name: &str) -> Option<String> {
        self.env.remove(name)
    }
}
