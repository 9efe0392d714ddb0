use std::io::{self, ErrorKind};
use std::os::fd::OwnedFd;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus};

use log::{debug, error, warn};

use super::builtin;
use super::redirect::{pipe, StageIo};
use crate::shell::job_manager::Job;
use crate::shell::parser::ast::{Joiner, Pipeline, Sequence, SimpleCommand};
use crate::shell::session::Session;

/// 找不到可执行文件
pub const EXIT_NOT_FOUND: i32 = 127;
/// 找到了但无法执行
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// 把子进程的退出状态折算为 shell 退出码，被信号终止时为 128 + 信号值
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

fn spawn_failure(program: &str, err: &io::Error) -> (i32, String) {
    match err.kind() {
        ErrorKind::NotFound => (
            EXIT_NOT_FOUND,
            format!("nagare: {}: command not found", program),
        ),
        ErrorKind::PermissionDenied => (
            EXIT_NOT_EXECUTABLE,
            format!("nagare: {}: permission denied", program),
        ),
        _ => (EXIT_NOT_EXECUTABLE, format!("nagare: {}: {}", program, err)),
    }
}

/// 单个阶段的启动结果
enum Launch {
    Spawned(Child),
    Finished(i32),
}

pub struct Executor<'s> {
    session: &'s mut Session,
}

impl<'s> Executor<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// 从左到右执行序列，`&&`/`||` 短路时跳过紧随其后的一个单元
    pub fn execute(&mut self, sequence: &Sequence) -> i32 {
        debug!("执行序列: {}", sequence);
        let units = &sequence.units;
        let mut status = 0;
        let mut i = 0;
        while i < units.len() {
            let unit = &units[i];
            status = self.run_pipeline(&unit.pipeline);
            self.session.last_status = status;
            let skip_next = match unit.joiner {
                Joiner::And => status != 0,
                Joiner::Or => status == 0,
                Joiner::Seq | Joiner::None => false,
            };
            if let (true, Some(skipped)) = (skip_next, units.get(i + 1)) {
                debug!("短路跳过: {}", skipped.pipeline);
            }
            i += if skip_next { 2 } else { 1 };
        }
        status
    }

    fn try_builtin(&mut self, pipeline: &Pipeline) -> Option<i32> {
        let [stage] = pipeline.stages.as_slice() else {
            return None;
        };
        if pipeline.background || !stage.redirections.is_empty() {
            return None;
        }
        match stage.program()?.as_str() {
            "cd" => Some(builtin::cd(self.session, &stage.args())),
            _ => None,
        }
    }

    fn run_pipeline(&mut self, pipeline: &Pipeline) -> i32 {
        if let Some(status) = self.try_builtin(pipeline) {
            return status;
        }

        let count = pipeline.stages.len();
        let mut launches = Vec::with_capacity(count);
        let mut upstream = None;
        let mut pgid: Option<u32> = None;

        for (i, stage) in pipeline.stages.iter().enumerate() {
            let (next_reader, writer) = if i + 1 < count {
                match pipe() {
                    Ok((reader, writer)) => (Some(reader), Some(writer)),
                    Err(e) => {
                        error!("nagare: 无法创建管道: {}", e);
                        eprintln!("nagare: pipe: {}", e);
                        launches.push(Launch::Finished(1));
                        break;
                    }
                }
            } else {
                (None, None)
            };

            let launch = self.launch(
                stage,
                upstream.take(),
                writer,
                pipeline.background,
                pgid,
            );
            if let Launch::Spawned(child) = &launch {
                pgid.get_or_insert(child.id());
            }
            launches.push(launch);
            upstream = next_reader;
        }
        // 到这里所有管道端点都已交给子进程或被 drop
        drop(upstream);

        if pipeline.background {
            return self.register_job(pipeline, launches);
        }

        let mut status = 0;
        for launch in launches {
            status = match launch {
                Launch::Finished(code) => code,
                Launch::Spawned(mut child) => match child.wait() {
                    Ok(exit) => exit_code(exit),
                    Err(e) => {
                        error!("nagare: 等待进程 {} 失败: {}", child.id(), e);
                        1
                    }
                },
            };
        }
        debug!("pipeline 结束, 退出码 {}", status);
        status
    }

    fn launch(
        &self,
        stage: &SimpleCommand,
        stdin: Option<OwnedFd>,
        pipe_out: Option<OwnedFd>,
        background: bool,
        pgid: Option<u32>,
    ) -> Launch {
        let mut io = match StageIo::new(stdin, pipe_out) {
            Ok(io) => io,
            Err(e) => {
                error!("nagare: 无法复制描述符: {}", e);
                eprintln!("nagare: {}", e);
                return Launch::Finished(1);
            }
        };
        for redirection in &stage.redirections {
            if let Err(e) = io.apply(redirection, &self.session.cwd) {
                warn!("重定向失败 {}: {}", redirection, e);
                eprintln!("nagare: {}", e);
                return Launch::Finished(1);
            }
        }

        let Some(program) = stage.program() else {
            // 只有重定向的命令：文件已经打开过，不启动进程
            return Launch::Finished(0);
        };

        let [stdin, stdout, stderr] = match io.into_stdio() {
            Ok(stdio) => stdio,
            Err(e) => {
                error!("nagare: 无法准备标准输入输出: {}", e);
                eprintln!("nagare: {}", e);
                return Launch::Finished(1);
            }
        };

        let mut command = Command::new(&program);
        command
            .args(stage.args())
            .env_clear()
            .envs(self.session.env())
            .current_dir(&self.session.cwd)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr);
        if background {
            command.process_group(pgid.map(|pid| pid as i32).unwrap_or(0));
        }

        debug!("启动进程: {}", stage);
        let spawned = command.spawn();
        // Command 里还握着管道端点的副本，必须在等待前释放
        drop(command);
        match spawned {
            Ok(child) => Launch::Spawned(child),
            Err(e) => {
                let (code, message) = spawn_failure(&program, &e);
                warn!("启动 {} 失败: {}", program, e);
                eprintln!("{}", message);
                Launch::Finished(code)
            }
        }
    }

    fn register_job(&mut self, pipeline: &Pipeline, launches: Vec<Launch>) -> i32 {
        let final_exit = match launches.last() {
            Some(Launch::Finished(code)) => Some(*code),
            _ => None,
        };
        let children: Vec<Child> = launches
            .into_iter()
            .filter_map(|launch| match launch {
                Launch::Spawned(child) => Some(child),
                Launch::Finished(_) => None,
            })
            .collect();
        if children.is_empty() {
            return 0;
        }
        let interactive = self.session.interactive;
        let jobs = &mut self.session.background_jobs;
        let index = jobs.add_job(children, pipeline.to_string(), final_exit);
        if interactive {
            if let Some(pid) = jobs.get(index).and_then(Job::last_pid) {
                eprintln!("[{}] {}", index, pid);
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        // SIGINT
        assert_eq!(exit_code(ExitStatus::from_raw(2)), 130);
        // SIGKILL
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
    }

    #[test]
    fn test_spawn_failure_codes() {
        let (code, message) = spawn_failure("nope", &io::Error::from(ErrorKind::NotFound));
        assert_eq!(code, 127);
        assert_eq!(message, "nagare: nope: command not found");

        let (code, message) =
            spawn_failure("./x", &io::Error::from(ErrorKind::PermissionDenied));
        assert_eq!(code, 126);
        assert!(message.ends_with("permission denied"));
    }

    fn session() -> Session {
        let mut env = HashMap::new();
        if let Ok(path) = std::env::var("PATH") {
            env.insert("PATH".to_string(), path);
        }
        Session::new("/", env)
    }

    #[allow(clippy::unwrap_used)]
    fn run(line: &str, session: &mut Session) -> i32 {
        let sequence = crate::shell::parser::parse(line).unwrap();
        Executor::new(session).execute(&sequence)
    }

    #[test]
    fn test_short_circuit_skips_one_unit() {
        let mut session = session();
        assert_eq!(run("false && true", &mut session), 1);
        assert_eq!(run("true || false", &mut session), 0);
        // 被跳过单元自身的 `||` 不再参与判断
        assert_eq!(run("false && false || true", &mut session), 0);
        assert_eq!(run("true || false && false", &mut session), 1);
        assert_eq!(run("false ; true", &mut session), 0);
        assert_eq!(session.last_status, 0);
    }

    #[test]
    fn test_last_stage_status() {
        let mut session = session();
        assert_eq!(run("false | true", &mut session), 0);
        assert_eq!(run("true | false", &mut session), 1);
    }

    #[test]
    fn test_missing_command() {
        let mut session = session();
        assert_eq!(run("no_such_command_nagare", &mut session), 127);
        assert_eq!(run("no_such_command_nagare || true", &mut session), 0);
    }
}
