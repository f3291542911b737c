pub mod memory;
pub mod redis;

pub use memory::InMemoryUserCache;
pub use redis::RedisUserCache;
