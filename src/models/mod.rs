//! Data models

mod session;
mod track;
mod user;

pub use session::*;
pub use track::*;
pub use user::*;
