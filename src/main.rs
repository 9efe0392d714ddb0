use log::debug;
use nagare::shell::Shell;
use nagare::utils::config::Config;
use nagare::utils::log::init_logger;
use nagare::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new();
    init_logger(&config);
    debug!("配置加载成功 {}", config.config_dir.display());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let status = if args.is_empty() {
        Shell::new(&config)?.run()?
    } else {
        // 一次性模式：参数拼成一行执行后退出
        let line = args.join(" ");
        debug!("执行命令行参数: {}", line);
        let mut session = Session::from_process()?;
        nagare::run_line(&line, &mut session)
    };

    std::process::exit(status);
}
