// 会话存储实现

pub mod session;

pub use session::{MemorySessionStore, RedisSessionStore};
