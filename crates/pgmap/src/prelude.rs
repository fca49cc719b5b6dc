//! Convenient imports for typical `pgmap` usage.
//!
//! ```ignore
//! use pgmap::prelude::*;
//! ```

pub use crate::{
    ColumnBinding, DbConfig, ExecReport, GenericClient, OrmError, OrmResult, Record,
    decode_many, decode_one, decoder, exec_report, upsert,
};

#[cfg(feature = "pool")]
pub use crate::{Database, create_pool, create_pool_from_config, create_pool_with_config};
