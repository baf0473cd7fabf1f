//! An object manager for relational stores: declare models with
//! attributes and relations, resolve them into a schema, and move
//! entities through their persistence lifecycle over pooled backend
//! connections.

mod entity;
pub use entity::{Entity, EntityState};

mod engine;

mod manager;
pub use manager::{Manager, ManagerOptions};

pub mod mock;

mod pool;
pub use pool::{Pool, PoolConfig, PoolConnection};

mod transaction;
pub use transaction::Transaction;

pub use loam_core::driver;
pub use loam_core::schema;
pub use loam_core::stmt;
pub use loam_core::{Error, ErrorKind, Result, Schema};

pub use loam_sql::{Condition, FindOptions, Op, Scope, ScopeGuard, ScopeStack};
