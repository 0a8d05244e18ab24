pub mod user;

pub use user::{MemoryUserStore, NewUser, PostgresUserStore, UserRecord, UserStore};
