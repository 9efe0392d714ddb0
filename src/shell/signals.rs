use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_: c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// 交互 shell 自己不因 Ctrl-C / Ctrl-\ 退出。
/// 只安装处理函数而不是忽略信号，exec 之后子进程会恢复默认行为。
pub fn install_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGQUIT] {
        // 处理函数只写一个原子变量，是 async-signal-safe 的
        unsafe { sigaction(signal, &action) }?;
        debug!("已安装信号处理: {}", signal);
    }
    Ok(())
}

/// 读取并清除中断标记
pub fn take_interrupted() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}
