use std::fmt;
use std::process::Child;

use log::{debug, error};

use super::executor::exit_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done(i32),
}

/// 一个后台 pipeline：同一进程组内的全部子进程
#[derive(Debug)]
pub struct Job {
    pub pgid: i32,
    pub index: usize,
    pub command: String,
    pub status: JobStatus,
    pub is_current: bool,
    pub is_previous: bool,
    children: Vec<Child>,
    exits: Vec<Option<i32>>,
    /// 最后一个阶段没能启动时合成的退出码
    final_exit: Option<i32>,
}

impl Job {
    fn new(
        index: usize,
        command: String,
        children: Vec<Child>,
        final_exit: Option<i32>,
    ) -> Self {
        let pgid = children.first().map(|c| c.id() as i32).unwrap_or_default();
        let exits = vec![None; children.len()];
        Self {
            pgid,
            index,
            command,
            status: JobStatus::Running,
            is_current: false,
            is_previous: false,
            children,
            exits,
            final_exit,
        }
    }

    pub fn last_pid(&self) -> Option<u32> {
        self.children.last().map(Child::id)
    }

    /// 非阻塞地轮询所有子进程，全部结束后以最后一个阶段的退出码标记为完成
    fn poll(&mut self) -> JobStatus {
        for (child, exit) in self.children.iter_mut().zip(self.exits.iter_mut()) {
            if exit.is_some() {
                continue;
            }
            match child.try_wait() {
                Ok(Some(status)) => *exit = Some(exit_code(status)),
                Ok(None) => {}
                Err(e) => {
                    error!("nagare: 无法查询后台进程 {}: {}", child.id(), e);
                    *exit = Some(1);
                }
            }
        }
        if self.exits.iter().all(Option::is_some) {
            let code = self
                .final_exit
                .or_else(|| self.exits.last().copied().flatten())
                .unwrap_or(0);
            self.status = JobStatus::Done(code);
        }
        self.status
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            JobStatus::Running => "running".to_string(),
            JobStatus::Done(0) => "done".to_string(),
            JobStatus::Done(code) => format!("exit {}", code),
        };
        let mark = if self.is_current {
            "+"
        } else if self.is_previous {
            "-"
        } else {
            " "
        };
        write!(
            f,
            "[{}] {} {} {} {}",
            self.index, mark, self.pgid, status, self.command
        )
    }
}

/// 后台任务表。执行器只会追加任务，回收由交互层调用 `reap` 完成
#[derive(Debug, Default)]
pub struct JobManager {
    jobs: Vec<Job>,
}

impl JobManager {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn get_jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Job> {
        self.jobs.iter().find(|job| job.index == index)
    }

    fn find_available_index(&self) -> usize {
        let mut index = 1;
        while self.jobs.iter().any(|job| job.index == index) {
            index += 1;
        }
        index
    }

    /// `final_exit` 非空时作为整个任务的退出码，用于最后一个阶段启动失败的情况
    pub fn add_job(
        &mut self,
        children: Vec<Child>,
        command: String,
        final_exit: Option<i32>,
    ) -> usize {
        let index = self.find_available_index();
        let job = Job::new(index, command, children, final_exit);
        debug!("添加后台任务 [{}] pgid={} {}", index, job.pgid, job.command);
        self.jobs.push(job);
        self.update_marks(index);
        index
    }

    /// 回收已经结束的任务并从表中移除
    pub fn reap(&mut self) -> Vec<Job> {
        let mut finished = Vec::new();
        let mut pos = 0;
        while pos < self.jobs.len() {
            if let JobStatus::Done(_) = self.jobs[pos].poll() {
                let job = self.remove_at(pos);
                debug!("后台任务结束: {}", job);
                finished.push(job);
            } else {
                pos += 1;
            }
        }
        finished
    }

    fn remove_at(&mut self, pos: usize) -> Job {
        let job = self.jobs.remove(pos);
        if job.is_current && !self.jobs.is_empty() {
            // 如果删除的是当前任务，将上一个任务提升为当前任务
            if let Some(prev_job) = self.jobs.iter_mut().find(|job| job.is_previous) {
                prev_job.is_current = true;
                prev_job.is_previous = false;
            } else if let Some(last) = self.jobs.last_mut() {
                last.is_current = true;
            }
        }
        job
    }

    fn update_marks(&mut self, current_job_index: usize) {
        for job in self.jobs.iter_mut() {
            if job.index == current_job_index {
                job.is_current = true;
                job.is_previous = false;
            } else if job.is_current {
                job.is_current = false;
                job.is_previous = true;
            } else {
                job.is_previous = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread;
    use std::time::Duration;

    #[allow(clippy::unwrap_used)]
    fn spawn(program: &str, args: &[&str]) -> Child {
        Command::new(program).args(args).spawn().unwrap()
    }

    fn reap_until_empty(manager: &mut JobManager) -> Vec<Job> {
        let mut finished = Vec::new();
        for _ in 0..200 {
            finished.extend(manager.reap());
            if manager.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(25));
        }
        finished
    }

    #[test]
    fn test_indexes_and_marks() {
        let mut manager = JobManager::new();
        let first = manager.add_job(vec![spawn("true", &[])], "true".to_string(), None);
        let second = manager.add_job(vec![spawn("true", &[])], "true".to_string(), None);
        assert_eq!((first, second), (1, 2));

        let jobs = manager.get_jobs();
        assert!(jobs[0].is_previous && !jobs[0].is_current);
        assert!(jobs[1].is_current);

        let finished = reap_until_empty(&mut manager);
        assert_eq!(finished.len(), 2);
        assert!(finished.iter().all(|job| job.status == JobStatus::Done(0)));
    }

    #[test]
    fn test_last_stage_status_wins() {
        let mut manager = JobManager::new();
        manager.add_job(
            vec![spawn("true", &[]), spawn("false", &[])],
            "true | false".to_string(),
            None,
        );
        let finished = reap_until_empty(&mut manager);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].status, JobStatus::Done(1));
        assert!(finished[0].to_string().contains("exit 1 true | false"));
    }

    #[test]
    fn test_synthesized_final_exit_wins() {
        let mut manager = JobManager::new();
        manager.add_job(
            vec![spawn("true", &[])],
            "true | nosuch".to_string(),
            Some(127),
        );
        let finished = reap_until_empty(&mut manager);
        assert_eq!(finished[0].status, JobStatus::Done(127));
    }

    #[test]
    fn test_freed_index_is_reused() {
        let mut manager = JobManager::new();
        manager.add_job(vec![spawn("true", &[])], "true".to_string(), None);
        reap_until_empty(&mut manager);
        let index = manager.add_job(
            vec![spawn("sleep", &["0.1"])],
            "sleep 0.1".to_string(),
            None,
        );
        assert_eq!(index, 1);
        assert!(manager.get(1).and_then(Job::last_pid).is_some());
        reap_until_empty(&mut manager);
    }
}
