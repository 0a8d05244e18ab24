pub mod handler;

pub use handler::serve;
