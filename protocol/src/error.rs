//! 错误类型定义

use thiserror::Error;

/// 协议层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 数据报超长
    #[error("datagram too long: {len} bytes (max: {max})")]
    DatagramTooLong { len: usize, max: usize },

    /// 消息无法解析
    #[error("cannot parse message: {reason}")]
    Malformed { reason: &'static str },
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
