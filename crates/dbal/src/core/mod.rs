//! Core abstractions: capability traits, the portable schema model and the
//! portable value model.

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{
    Column, ColumnDiff, ForeignKeyConstraint, Index, PortableType, Sequence, Table, TableDiff,
    View,
};
pub use traits::{
    Driver, DriverConnection, DriverResult, ExceptionConverter, Middleware, NativeError, RowSet,
};
pub use value::SqlValue;
