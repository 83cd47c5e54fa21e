//! Recommended API entrypoints grouped by abstraction level.
//!
//! `use gameobj::prelude::*;` brings in what game code needs to register
//! types and work with objects. `advanced` holds the transport seams for
//! running on another database or discovery backend.

pub use crate::{
    CommitMode, CreateScope, Entity, FieldDef, FieldType, InitOptions, ObjectError, ObjectStore,
    Result, SchemaRegistry, StoreOptions, Value,
};

pub mod advanced {
    //! Escape hatch for custom transports.
    //!
    //! Game code should normally stay on the top-level prelude.
    pub use crate::discovery::{ConfigResolver, DatabaseRecord, DiscoveryClient, database_key};
    pub use crate::interface::{ConnectionFactory, SqlConnection, TransportError};
    pub use crate::persist::PersistSession;
}
