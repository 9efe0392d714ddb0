use log::{debug, error, warn};
use std::error::Error;
use std::io::{self, Write};

use crate::shell::executor::Executor;
use crate::shell::parser;
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::session::Session;
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::path::tilde_path;
use crate::utils::theme::Theme;

pub struct Shell<'a> {
    theme: Theme,
    readline: ReadlineManager<'a>,
    session: Session,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, Box<dyn Error>> {
        let mut session = Session::from_process()?;
        session.interactive = true;
        Ok(Self {
            theme: Theme::load_theme(&config.theme),
            readline: ReadlineManager::new(config)?,
            session,
        })
    }

    pub fn run(&mut self) -> Result<i32, Box<dyn Error>> {
        debug!("初始化 nagare...");

        if let Err(e) = signals::install_handlers() {
            warn!("无法安装信号处理: {}", e);
        }
        self.readline.load_history();

        println!("{}", self.theme.welcome_message);
        debug!("nagare 准备就绪...");

        self.run_loop()?;
        self.readline.save_history();

        debug!("退出 nagare, 最后退出码 {}", self.session.last_status);
        Ok(self.session.last_status)
    }

    fn prompt(&self) -> String {
        let dir = tilde_path(&self.session.cwd, self.session.var("HOME"));
        self.theme.prompt(&dir, self.session.last_status)
    }

    fn report_jobs(&mut self) {
        for job in self.session.background_jobs.reap() {
            eprintln!("{}", self.theme.job_line(&job));
        }
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            self.report_jobs();
            io::stdout().flush()?;
            signals::take_interrupted();

            match self.readline.readline(&self.prompt()) {
                Ok(line) => {
                    if line.trim() == "exit" {
                        println!("{}", self.theme.exit_message);
                        break;
                    }
                    self.handle_input(&line)?;
                }
                Err(ReadlineError::Eof) => {
                    warn!("接收到 EOF 信号，退出 nagare...");
                    println!("\n{}", self.theme.eof_message);
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("接收到中断信号");
                    println!("{}", self.theme.interrupt_message);
                    self.session.last_status = 130;
                }
                Err(err) => {
                    error!("读取输入失败: {}", err);
                    eprintln!(
                        "{} {}",
                        self.theme.error_symbol,
                        (self.theme.error_style)(err.to_string())
                    );
                }
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &str) -> Result<(), Box<dyn Error>> {
        if line.trim().is_empty() {
            return Ok(());
        }
        self.readline.add_history(line)?;

        match parser::parse(line) {
            Ok(sequence) => {
                Executor::new(&mut self.session).execute(&sequence);
                if signals::take_interrupted() {
                    // 前台命令被 Ctrl-C 打断后换行，保持提示符对齐
                    println!();
                }
            }
            Err(e) => {
                debug!("解析失败: {:?}", e);
                eprintln!(
                    "{} {}",
                    self.theme.error_symbol,
                    (self.theme.error_style)(format!("nagare: {}", e))
                );
                self.session.last_status = 1;
            }
        }
        Ok(())
    }
}
