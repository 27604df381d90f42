pub mod predicate;
pub mod recommendations;
pub mod union_query;
