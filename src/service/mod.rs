//! Services executing CRUD, relation and raw SQL operations against the pool.

mod crud;
mod relations;
mod sql_exec;

pub use crud::{CrudService, TableView};
pub use relations::{
    resolve_relation, RelationData, RelationsConfig, RelationsService, UpdateRelatedRowsActions,
};
pub use sql_exec::{SqlExecutionRequest, SqlExecutionResponse, SqlExecutionService, SQL_ROWS_LIMIT};
