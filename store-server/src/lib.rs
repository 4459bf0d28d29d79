//! Store Server - 库存预留与一致性核心
//!
//! # 架构概述
//!
//! 电商后端的库存一致性层，核心不变量：**永不超卖**。
//!
//! - **原子扣减** (`inventory::mutator`): 条件 UPDATE，无检查-更新窗口
//! - **库存台账** (`inventory::ledger`): 只追加审计流 + 对账重放
//! - **购物车预留** (`cart`): 带过期时间的软预留（加车即扣减）
//! - **订单编排** (`orders`): 全有或全无的结算、超时回收、支付事件
//! - **HTTP API** (`api`): RESTful 接口
//!
//! # 模块结构
//!
//! ```text
//! store-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # 请求身份提取
//! ├── inventory/     # 原子扣减 + 台账
//! ├── cart/          # 预留管理
//! ├── orders/        # 结算、回收、支付、履约
//! ├── notify/        # 领域事件广播
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 数据库层（SQLite）
//! └── utils/         # 错误、日志、时间
//! ```

pub mod api;
pub mod auth;
pub mod cart;
pub mod core;
pub mod db;
pub mod inventory;
pub mod notify;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use auth::{AdminUser, CurrentUser};
pub use core::{Config, Server, ServerState};
pub use inventory::{InventoryError, InventoryResult};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
   _____ __
  / ___// /_____  ________
  \__ \/ __/ __ \/ ___/ _ \
 ___/ / /_/ /_/ / /  /  __/
/____/\__/\____/_/   \___/
    "#
    );
}
