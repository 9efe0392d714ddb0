//! 流れ（nagare）：带管道、重定向与 `&&`/`||`/`;` 序列的命令行解析与执行核心

pub mod shell;
pub mod utils;

pub use shell::executor::{exit_code, Executor};
pub use shell::parser::{parse, tokenize, ParseError};
pub use shell::session::Session;

/// 解析并执行一行输入，返回最后一个被执行单元的退出码。
/// 解析失败时不会启动任何进程，也不会修改会话。
pub fn execute(line: &str, session: &mut Session) -> Result<i32, ParseError> {
    let sequence = parse(line)?;
    Ok(Executor::new(session).execute(&sequence))
}

/// 与 [`execute`] 相同，但把解析错误打印到 stderr 并折算为退出码 1
pub fn run_line(line: &str, session: &mut Session) -> i32 {
    match execute(line, session) {
        Ok(status) => status,
        Err(e) => {
            log::debug!("解析失败: {:?}", e);
            eprintln!("nagare: {}", e);
            session.last_status = 1;
            1
        }
    }
}
