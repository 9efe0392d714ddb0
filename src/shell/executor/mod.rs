mod builtin;
mod executor;
mod redirect;

pub use executor::{exit_code, Executor, EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND};
pub use redirect::RedirectError;
