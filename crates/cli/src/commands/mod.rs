//! Command implementations.

mod info;
mod record;
mod run;
mod validate;

pub use info::run_info;
pub use record::run_record;
pub use run::run_stream;
pub use validate::run_validate;
