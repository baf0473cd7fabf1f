mod condition;
pub use condition::{Condition, Op};

pub mod ddl;

pub mod evolution;

mod query;
pub use query::{compile_aggregate, compile_find, FindOptions};

mod scope;
pub use scope::{Scope, ScopeGuard, ScopeStack};
