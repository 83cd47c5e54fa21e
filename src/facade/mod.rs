pub mod options;
pub mod store;

pub use options::{InitOptions, StoreOptions};
pub use store::ObjectStore;
