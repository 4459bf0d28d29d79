//! Data Models
//!
//! sqlx row types and their create/update DTOs.

pub mod cart;
pub mod ledger;
pub mod order;
pub mod product;

pub use cart::{CartItem, CartLine, DesiredItem, ResolvedCart};
pub use ledger::{LedgerEntry, LedgerEntryType};
pub use order::{Order, OrderDetail, OrderItem, OrderStatus, OrderStatusHistory};
pub use product::{Product, ProductCreate, ProductUpdate};
