mod user_store_memory;

pub use user_store_memory::*;
