//! # xu-core
//!
//! Xu 框架核心库, 提供跨 crate 共用的错误类型与基础设施.

pub mod error;

// 重导出常用类型
pub use error::{XuError, XuResult};
