pub mod order;
pub mod shop;
pub mod variety;
