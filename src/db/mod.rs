pub mod executor;
pub mod loader;
pub mod pool;
pub mod schema;
