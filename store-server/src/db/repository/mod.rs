//! Repository Layer
//!
//! 目录与订单的读写封装。注意：没有任何 repository 方法直接写
//! `product.stock` — 库存变动一律经过 inventory 模块。

mod order;
mod product;

pub use order::OrderRepository;
pub use product::ProductRepository;
