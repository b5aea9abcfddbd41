pub mod execute;
pub mod operators;
pub mod types;

pub use execute::execute_live_query;
pub use operators::{matches_selector, SelectorMatcher};
pub use types::{parse_sort, LiveQuery, SortDirection, SortEntry};
