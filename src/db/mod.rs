pub mod pool;
pub mod schema;
pub mod session;

pub use pool::PoolManager;
pub use schema::{SchemaManager, SchemaState};
pub use session::{Identity, ScopedStore, Store, StoreError};
