pub mod executor;
pub mod job_manager;
pub mod parser;
pub mod readline;
pub mod session;
mod shell;
pub mod signals;

pub use shell::Shell;
