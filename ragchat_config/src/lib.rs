mod schema;

pub use schema::{BACKEND_URL_ENV, BackendConfig, Config, StorageConfig};
