//! Filter algebra, SQL query compilation and result grouping.

mod compiler;
mod filter;
mod grouping;

pub use compiler::{CompiledQuery, MediaQuery, QueryCompiler};
pub use filter::{escape_like, AttributeRef, CompareOp, Filter, LIKE_ESCAPE_CHAR};
pub use grouping::{
    FirstCharacterGrouping, Group, GroupingFunction, MediaItemGroup, EMPTY_GROUP_NAME,
    MISC_GROUP_NAME,
};
