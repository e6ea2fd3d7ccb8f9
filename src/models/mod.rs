//! Backend-neutral domain types shared by both stores and the services.

pub mod order;
pub mod shop;
pub mod variety;

pub use order::{
    check_amount, normalize_payment, Order, OrderFilter, OrderWrite, PaymentStatus, MAX_AMOUNT,
};
pub use shop::Shop;
pub use variety::Variety;
