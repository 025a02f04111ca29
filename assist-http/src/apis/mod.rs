pub mod assistant;
pub mod page;
