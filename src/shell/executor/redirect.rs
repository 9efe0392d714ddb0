use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use nix::fcntl::OFlag;
use thiserror::Error;

use crate::shell::parser::ast::{RedirectKind, Redirection};

#[derive(Error, Debug)]
pub enum RedirectError {
    #[error("{}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("{0}: bad file descriptor")]
    BadDescriptor(u32),
    #[error("cannot duplicate file descriptor: {0}")]
    Duplicate(#[from] io::Error),
}

/// 子进程 0/1/2 中某一个描述符的来源
#[derive(Debug)]
enum Slot {
    /// 直接使用父进程的同号描述符
    Inherit(u32),
    Fd(OwnedFd),
}

impl Slot {
    fn try_clone(&self) -> io::Result<Slot> {
        match self {
            Slot::Inherit(fd) => Ok(Slot::Inherit(*fd)),
            Slot::Fd(fd) => Ok(Slot::Fd(fd.try_clone()?)),
        }
    }

    fn into_stdio(self, position: u32) -> io::Result<Stdio> {
        match self {
            Slot::Inherit(fd) if fd == position => Ok(Stdio::inherit()),
            Slot::Inherit(fd) => Ok(Stdio::from(parent_fd(fd)?)),
            Slot::Fd(fd) => Ok(Stdio::from(fd)),
        }
    }
}

fn parent_fd(fd: u32) -> io::Result<OwnedFd> {
    match fd {
        0 => io::stdin().as_fd().try_clone_to_owned(),
        1 => io::stdout().as_fd().try_clone_to_owned(),
        _ => io::stderr().as_fd().try_clone_to_owned(),
    }
}

/// 创建一对管道，两端在创建时就带 close-on-exec，不会泄漏到并发启动的子进程
pub fn pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(OFlag::O_CLOEXEC)
}

/// 单个 pipeline 阶段的描述符表。所有描述符都是 owned 的，
/// 任何返回路径上 drop 时都会关闭。
#[derive(Debug)]
pub struct StageIo {
    slots: [Slot; 3],
    pipe_out: Option<OwnedFd>,
}

impl StageIo {
    /// `stdin` 为上一阶段管道的读端，`pipe_out` 为通往下一阶段的写端
    pub fn new(stdin: Option<OwnedFd>, pipe_out: Option<OwnedFd>) -> io::Result<Self> {
        let stdout = match &pipe_out {
            Some(fd) => Slot::Fd(fd.try_clone()?),
            None => Slot::Inherit(1),
        };
        let stdin = match stdin {
            Some(fd) => Slot::Fd(fd),
            None => Slot::Inherit(0),
        };
        Ok(Self {
            slots: [stdin, stdout, Slot::Inherit(2)],
            pipe_out,
        })
    }

    fn slot_index(fd: u32) -> Result<usize, RedirectError> {
        match fd {
            0..=2 => Ok(fd as usize),
            _ => Err(RedirectError::BadDescriptor(fd)),
        }
    }

    /// 按源码顺序应用重定向，同一个 fd 后出现的覆盖先出现的
    pub fn apply(&mut self, redirection: &Redirection, cwd: &Path) -> Result<(), RedirectError> {
        let index = Self::slot_index(redirection.fd)?;
        let slot = match &redirection.kind {
            RedirectKind::WriteTrunc(target) => {
                let path = cwd.join(target);
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path);
                Slot::Fd(opened(file, path)?)
            }
            RedirectKind::WriteAppend(target) => {
                let path = cwd.join(target);
                let file = OpenOptions::new().append(true).create(true).open(&path);
                Slot::Fd(opened(file, path)?)
            }
            RedirectKind::Read(target) => {
                let path = cwd.join(target);
                Slot::Fd(opened(File::open(&path), path)?)
            }
            RedirectKind::Dup(target) => {
                let source = Self::slot_index(*target)?;
                self.slots[source].try_clone()?
            }
        };
        self.slots[index] = slot;
        Ok(())
    }

    /// 非末尾阶段的 stdout 总是接到管道，显式的 stdout 重定向只会创建文件
    pub fn into_stdio(self) -> io::Result<[Stdio; 3]> {
        let [stdin, mut stdout, stderr] = self.slots;
        if let Some(fd) = self.pipe_out {
            stdout = Slot::Fd(fd);
        }
        Ok([
            stdin.into_stdio(0)?,
            stdout.into_stdio(1)?,
            stderr.into_stdio(2)?,
        ])
    }
}

fn opened(file: io::Result<File>, path: PathBuf) -> Result<OwnedFd, RedirectError> {
    file.map(OwnedFd::from)
        .map_err(|source| RedirectError::Open { path, source })
}
