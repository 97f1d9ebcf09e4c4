//! 捷克跳棋服务端
//!
//! 包含:
//! - 会话管理（token 权威映射 + 端点索引）
//! - 房间系统与回合状态机
//! - 走子处理与胜负判定
//! - 周期扫描（停摆冻结、心跳、回合超时、重连窗口）
//! - 发现服务

pub mod config;
pub mod discovery;
pub mod game;
pub mod player;
pub mod room;
pub mod server;

pub use config::ServerConfig;
pub use game::TurnClock;
pub use player::{Session, SessionRegistry};
pub use room::{Room, RoomManager};
pub use server::{MessageHandler, Outbox, ServerState};
