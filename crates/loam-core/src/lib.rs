pub mod driver;

mod error;
pub use error::{Error, ErrorKind};

pub mod schema;
pub use schema::{Registry, Schema};

pub mod stmt;

/// A Result type alias that uses Loam's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

pub use async_trait::async_trait;
