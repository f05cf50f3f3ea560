//! 统一错误类型定义.
//!
//! 所有 Xu crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Xu 框架统一错误类型
#[derive(Debug, Error)]
pub enum XuError {
    /// 无效数据 (损坏或不自洽的码流)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的码流特性
    #[error("不支持的码流特性: {0}")]
    Unsupported(String),

    /// 功能未实现
    #[error("功能未实现: {0}")]
    NotImplemented(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Xu 框架统一 Result 类型
pub type XuResult<T> = Result<T, XuError>;
