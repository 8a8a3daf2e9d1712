pub mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, load_json, save_json};
