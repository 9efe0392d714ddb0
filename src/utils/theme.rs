use colored::Colorize;

use crate::shell::job_manager::{Job, JobStatus};

pub struct Theme {
    pub prompt_symbol: String,
    pub success_symbol: String,
    pub error_symbol: String,
    pub welcome_message: String,
    pub exit_message: String,
    pub eof_message: String,
    pub interrupt_message: String,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub success_style: Box<dyn Fn(String) -> String>,
    pub path_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt_symbol: "流> ".bright_cyan().to_string(),
            success_symbol: "~".bright_blue().to_string(),
            error_symbol: "✗".red().to_string(),
            welcome_message: "流れ shell，输入 exit 退出".bright_cyan().to_string(),
            exit_message: "さようなら～".bright_blue().to_string(),
            eof_message: "收到 EOF，退出".bright_blue().to_string(),
            interrupt_message: "已中断".yellow().to_string(),
            error_style: Box::new(|s| s.bright_red().to_string()),
            success_style: Box::new(|s| s.bright_blue().to_string()),
            path_style: Box::new(|s| s.cyan().bold().to_string()),
        }
    }
}

impl Theme {
    pub fn load_theme(theme_name: &str) -> Theme {
        match theme_name {
            "dark" => Theme {
                prompt_symbol: "流～➤ ".bright_purple().to_string(),
                success_symbol: "~".magenta().to_string(),
                error_symbol: "✗".red().to_string(),
                welcome_message: "流れ shell (dark)，输入 exit 退出"
                    .bright_purple()
                    .to_string(),
                exit_message: "さようなら～".bright_purple().to_string(),
                eof_message: "收到 EOF，退出".bright_purple().to_string(),
                interrupt_message: "已中断".yellow().to_string(),
                error_style: Box::new(|s| s.red().to_string()),
                success_style: Box::new(|s| s.magenta().to_string()),
                path_style: Box::new(|s| s.purple().bold().to_string()),
            },
            _ => Theme::default(),
        }
    }

    /// 上一条命令失败时提示符前显示错误符号和退出码
    pub fn prompt(&self, dir: &str, last_status: i32) -> String {
        let status = if last_status == 0 {
            self.success_symbol.clone()
        } else {
            format!(
                "{} {}",
                self.error_symbol,
                (self.error_style)(last_status.to_string())
            )
        };
        format!(
            "{} {} {}",
            status,
            (self.path_style)(dir.to_string()),
            self.prompt_symbol
        )
    }

    /// 后台任务结束提示：正常退出用成功样式，其余用错误样式
    pub fn job_line(&self, job: &Job) -> String {
        match job.status {
            JobStatus::Done(0) => (self.success_style)(job.to_string()),
            _ => (self.error_style)(job.to_string()),
        }
    }
}
