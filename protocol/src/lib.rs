//! 捷克跳棋（dáma）共享协议库
//!
//! 包含:
//! - 棋盘、棋子、坐标等核心数据结构
//! - 走法生成与捷克规则校验（强制吃子、连吃、王飞行、升王）
//! - 行协议编解码 (RawMessage, ClientMessage, ServerMessage)
//! - 错误码与常量定义

mod board;
mod constants;
mod error;
mod message;
mod moves;
mod piece;

pub use board::Board;
pub use constants::*;
pub use error::{ProtocolError, Result};
pub use message::{
    ClientMessage, ErrorCode, GameEndReason, PlayerId, RawMessage, Reject, RoomId, RoomStatus,
    ServerMessage, Turn, Winner,
};
pub use moves::{MoveError, MoveOutcome, PlannedMove, Rules};
pub use piece::{Piece, PieceColor, Square};
