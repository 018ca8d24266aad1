//! Command implementations.

mod info;
mod track;
mod validate;

pub use info::run_info;
pub use track::run_track;
pub use validate::run_validate;
