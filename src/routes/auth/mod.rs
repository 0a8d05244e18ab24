pub mod handler;
pub mod model;

pub use handler::{begin_login, finish_login, logout};
