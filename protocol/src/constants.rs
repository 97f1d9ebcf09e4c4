//! 协议常量定义

use std::time::Duration;

/// 棋盘边长（行数 = 列数）
pub const BOARD_SIZE: i32 = 8;

/// 每个房间的座位数
pub const ROOM_CAPACITY: usize = 2;

/// 昵称最大长度（字节）
pub const MAX_NICK_LEN: usize = 64;

/// 房间名最大长度（字节）
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// 单个数据报的最大长度（字节）
pub const MAX_DATAGRAM_LEN: usize = 1024;

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 5000;

/// 发现服务监听端口
pub const DISCOVERY_PORT: u16 = 9999;

/// 默认心跳超时基数（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// 默认心跳宽限倍数
pub const DEFAULT_TIMEOUT_GRACE: u32 = 1;

/// 默认回合超时（毫秒）
pub const DEFAULT_TURN_TIMEOUT_MS: u64 = 60_000;

/// 默认断线重连窗口（毫秒）
pub const DEFAULT_RECONNECT_WINDOW_MS: u64 = 60_000;

/// 默认最大玩家数
pub const DEFAULT_MAX_PLAYERS: usize = 10;

/// 默认最大房间数
pub const DEFAULT_MAX_ROOMS: usize = 5;

/// 无效消息上限：窗口内达到此数即断开会话
pub const INVALID_MSG_LIMIT: u32 = 3;

/// 无效消息计数窗口
pub const INVALID_MSG_WINDOW: Duration = Duration::from_secs(30);

/// CONFIG 重发间隔（未收到 CONFIG_ACK 时）
pub const CONFIG_RESEND_INTERVAL: Duration = Duration::from_secs(3);

/// 回合时钟冻结阈值上限（毫秒）
pub const PAUSE_THRESHOLD_CAP_MS: u64 = 12_000;

/// 定时扫描间隔，同时也是接收超时
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(500);
