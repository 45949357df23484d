pub mod cache;
pub mod redis_store;
pub mod store;

mod macros;

pub use cache::{Cache, CacheKey, CacheWriterHandle};
pub use redis_store::{create_redis_client, RedisStore};
pub use store::{KeyValueStore, MemoryStore};
