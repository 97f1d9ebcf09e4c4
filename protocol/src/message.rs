//! 消息类型定义与行编解码
//!
//! 线上格式：`<id>;<TYPE>[;<param>]*`，参数可为位置参数或 `key=value`；
//! 一个数据报一条消息，结尾换行可有可无。服务端主动下发的消息 id 为 0。

use std::collections::HashMap;
use std::fmt;

use crate::constants::{MAX_DATAGRAM_LEN, ROOM_CAPACITY};
use crate::error::{ProtocolError, Result};
use crate::moves::MoveError;
use crate::piece::{PieceColor, Square};

/// 玩家 ID
pub type PlayerId = u64;

/// 房间 ID
pub type RoomId = u64;

/// 房间状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// 等待玩家加入
    Waiting,
    /// 对局进行中
    InGame,
    /// 终局瞬态，随即重置回 Waiting
    Finished,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Waiting => "WAITING",
            RoomStatus::InGame => "IN_GAME",
            RoomStatus::Finished => "FINISHED",
        }
    }
}

/// 当前行棋方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    None,
    /// 0 号座位（白方）
    Player1,
    /// 1 号座位（黑方）
    Player2,
}

impl Turn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Turn::None => "NONE",
            Turn::Player1 => "PLAYER1",
            Turn::Player2 => "PLAYER2",
        }
    }

    /// 轮转到另一方
    pub fn other(&self) -> Turn {
        match self {
            Turn::None => Turn::None,
            Turn::Player1 => Turn::Player2,
            Turn::Player2 => Turn::Player1,
        }
    }
}

/// 对局结束原因（GAME_END 的 reason 参数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEndReason {
    WhiteWinNoPieces,
    BlackWinNoPieces,
    WhiteWinNoMoves,
    BlackWinNoMoves,
    OpponentLeft,
    OpponentTimeout,
    TurnTimeout,
}

impl GameEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameEndReason::WhiteWinNoPieces => "WHITE_WIN_NO_PIECES",
            GameEndReason::BlackWinNoPieces => "BLACK_WIN_NO_PIECES",
            GameEndReason::WhiteWinNoMoves => "WHITE_WIN_NO_MOVES",
            GameEndReason::BlackWinNoMoves => "BLACK_WIN_NO_MOVES",
            GameEndReason::OpponentLeft => "OPPONENT_LEFT",
            GameEndReason::OpponentTimeout => "OPPONENT_TIMEOUT",
            GameEndReason::TurnTimeout => "TURN_TIMEOUT",
        }
    }
}

/// 胜方（GAME_END 的 winner 参数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    White,
    Black,
    None,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::White => "WHITE",
            Winner::Black => "BLACK",
            Winner::None => "NONE",
        }
    }
}

impl From<PieceColor> for Winner {
    fn from(color: PieceColor) -> Self {
        match color {
            PieceColor::White => Winner::White,
            PieceColor::Black => Winner::Black,
        }
    }
}

/// 错误码（ERROR 消息的第一个参数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // === 格式 ===
    InvalidFormat,
    UnsupportedType,

    // === 鉴权与状态 ===
    NotLoggedIn,
    AlreadyLoggedIn,
    ServerFull,
    TokenNotFound,
    TokenExpired,
    RoomNotFound,
    RoomNotAvailable,
    RoomFull,
    RoomNotInGame,
    NotInRoom,
    GamePaused,

    // === 走法校验 ===
    NotYourTurn,
    OutOfBoard,
    InvalidSquare,
    NoPiece,
    NotYourPiece,
    DestNotEmpty,
    InvalidMove,
    InvalidDirection,
    MustCapture,
    MustContinueCapture,
    NoOpponentToCapture,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::UnsupportedType => "UNSUPPORTED_TYPE",
            ErrorCode::NotLoggedIn => "NOT_LOGGED_IN",
            ErrorCode::AlreadyLoggedIn => "ALREADY_LOGGED_IN",
            ErrorCode::ServerFull => "SERVER_FULL",
            ErrorCode::TokenNotFound => "TOKEN_NOT_FOUND",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::RoomNotFound => "ROOM_NOT_FOUND",
            ErrorCode::RoomNotAvailable => "ROOM_NOT_AVAILABLE",
            ErrorCode::RoomFull => "ROOM_FULL",
            ErrorCode::RoomNotInGame => "ROOM_NOT_IN_GAME",
            ErrorCode::NotInRoom => "NOT_IN_ROOM",
            ErrorCode::GamePaused => "GAME_PAUSED",
            ErrorCode::NotYourTurn => "NOT_YOUR_TURN",
            ErrorCode::OutOfBoard => "OUT_OF_BOARD",
            ErrorCode::InvalidSquare => "INVALID_SQUARE",
            ErrorCode::NoPiece => "NO_PIECE",
            ErrorCode::NotYourPiece => "NOT_YOUR_PIECE",
            ErrorCode::DestNotEmpty => "DEST_NOT_EMPTY",
            ErrorCode::InvalidMove => "INVALID_MOVE",
            ErrorCode::InvalidDirection => "INVALID_DIRECTION",
            ErrorCode::MustCapture => "MUST_CAPTURE",
            ErrorCode::MustContinueCapture => "MUST_CONTINUE_CAPTURE",
            ErrorCode::NoOpponentToCapture => "NO_OPPONENT_TO_CAPTURE",
        }
    }

    /// 是否计入无效消息计数（准入类拒绝不计）
    pub fn counts_as_strike(&self) -> bool {
        !matches!(
            self,
            ErrorCode::ServerFull | ErrorCode::RoomFull | ErrorCode::RoomNotAvailable
        )
    }
}

impl From<MoveError> for ErrorCode {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::OutOfBoard => ErrorCode::OutOfBoard,
            MoveError::InvalidSquare => ErrorCode::InvalidSquare,
            MoveError::NoPiece => ErrorCode::NoPiece,
            MoveError::NotYourPiece => ErrorCode::NotYourPiece,
            MoveError::DestNotEmpty => ErrorCode::DestNotEmpty,
            MoveError::InvalidMove => ErrorCode::InvalidMove,
            MoveError::InvalidDirection => ErrorCode::InvalidDirection,
            MoveError::MustCapture => ErrorCode::MustCapture,
            MoveError::NoOpponentToCapture => ErrorCode::NoOpponentToCapture,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 拒绝应答：错误码加可选的说明文字
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reject {
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl Reject {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}

impl From<MoveError> for Reject {
    fn from(err: MoveError) -> Self {
        Reject::new(err.into())
    }
}

/// 解析后的原始消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: i64,
    pub msg_type: String,
    /// 位置参数（按到达顺序）
    pub params: Vec<String>,
    /// key=value 参数视图（含 '=' 的参数同时出现在两处）
    pub kv: HashMap<String, String>,
}

impl RawMessage {
    /// 解析一行消息；调用方已去除行尾空白
    pub fn parse(line: &str) -> Result<RawMessage> {
        if line.len() > MAX_DATAGRAM_LEN {
            return Err(ProtocolError::DatagramTooLong {
                len: line.len(),
                max: MAX_DATAGRAM_LEN,
            });
        }

        let mut parts = line.split(';');

        let id_part = parts.next().unwrap_or("");
        let id: i64 = id_part
            .trim()
            .parse()
            .map_err(|_| ProtocolError::Malformed { reason: "bad id" })?;

        let msg_type = parts.next().unwrap_or("").trim().to_string();
        if msg_type.is_empty() {
            return Err(ProtocolError::Malformed {
                reason: "missing type",
            });
        }

        let mut params = Vec::new();
        let mut kv = HashMap::new();
        for part in parts {
            if let Some((key, value)) = part.split_once('=') {
                kv.insert(key.to_string(), value.to_string());
            }
            params.push(part.to_string());
        }

        Ok(RawMessage {
            id,
            msg_type,
            params,
            kv,
        })
    }

    /// 第 index 个位置参数
    fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

/// 客户端发往服务端的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    // === 身份 ===
    /// 登录
    Login { nick: String },
    /// 持 token 重连（端点可能已变化）
    Reconnect { token: String },
    /// 注销并清理会话
    Bye,

    // === 房间 ===
    /// 获取房间列表
    ListRooms,
    /// 创建房间（名称会被服务端命名替换）
    CreateRoom { name: String },
    /// 加入房间
    JoinRoom { room_id: RoomId },
    /// 离开房间
    LeaveRoom { room_id: RoomId },

    // === 对局 ===
    /// 走棋
    Move {
        room_id: RoomId,
        from: Square,
        to: Square,
    },
    /// 查询指定格的合法落点
    LegalMoves { room_id: RoomId, square: Square },

    // === 其他 ===
    /// 心跳
    Ping,
    /// 确认已收到 CONFIG
    ConfigAck,
}

/// 解析房间 id 参数
fn parse_room_id(raw: &RawMessage, index: usize) -> std::result::Result<RoomId, Reject> {
    let value = raw
        .param(index)
        .ok_or_else(|| Reject::with_detail(ErrorCode::InvalidFormat, "Missing roomId"))?;
    value
        .parse()
        .map_err(|_| Reject::with_detail(ErrorCode::InvalidFormat, "roomId must be number"))
}

/// 解析坐标参数；范围校验留给走法校验（OUT_OF_BOARD）
fn parse_coord(raw: &RawMessage, index: usize) -> std::result::Result<i32, Reject> {
    raw.param(index)
        .ok_or_else(|| {
            Reject::with_detail(ErrorCode::InvalidFormat, "Missing coordinate")
        })?
        .parse()
        .map_err(|_| Reject::with_detail(ErrorCode::InvalidFormat, "Coordinates must be numbers"))
}

impl ClientMessage {
    /// 从原始消息得到带类型的消息
    ///
    /// 缺参数或参数不是数字归为 INVALID_FORMAT，未知类型归为
    /// UNSUPPORTED_TYPE；再往后的状态类校验由各 handler 完成。
    pub fn from_raw(raw: &RawMessage) -> std::result::Result<ClientMessage, Reject> {
        match raw.msg_type.as_str() {
            "LOGIN" => {
                let nick = raw
                    .param(0)
                    .ok_or_else(|| Reject::with_detail(ErrorCode::InvalidFormat, "Missing nick"))?;
                Ok(ClientMessage::Login {
                    nick: nick.to_string(),
                })
            }
            "PING" => Ok(ClientMessage::Ping),
            "LIST_ROOMS" => Ok(ClientMessage::ListRooms),
            "CREATE_ROOM" => {
                let name = raw.param(0).ok_or_else(|| {
                    Reject::with_detail(ErrorCode::InvalidFormat, "Missing room name")
                })?;
                Ok(ClientMessage::CreateRoom {
                    name: name.to_string(),
                })
            }
            "JOIN_ROOM" => Ok(ClientMessage::JoinRoom {
                room_id: parse_room_id(raw, 0)?,
            }),
            "LEAVE_ROOM" => Ok(ClientMessage::LeaveRoom {
                room_id: parse_room_id(raw, 0)?,
            }),
            "MOVE" => {
                if raw.params.len() < 5 {
                    return Err(Reject::with_detail(
                        ErrorCode::InvalidFormat,
                        "Missing roomId/fromRow/fromCol/toRow/toCol",
                    ));
                }
                Ok(ClientMessage::Move {
                    room_id: parse_room_id(raw, 0)?,
                    from: Square::new(parse_coord(raw, 1)?, parse_coord(raw, 2)?),
                    to: Square::new(parse_coord(raw, 3)?, parse_coord(raw, 4)?),
                })
            }
            "LEGAL_MOVES" => {
                if raw.params.len() < 3 {
                    return Err(Reject::with_detail(
                        ErrorCode::InvalidFormat,
                        "Missing roomId/row/col",
                    ));
                }
                Ok(ClientMessage::LegalMoves {
                    room_id: parse_room_id(raw, 0)?,
                    square: Square::new(parse_coord(raw, 1)?, parse_coord(raw, 2)?),
                })
            }
            "BYE" => Ok(ClientMessage::Bye),
            "CONFIG_ACK" => Ok(ClientMessage::ConfigAck),
            "RECONNECT" => {
                let token = raw.param(0).ok_or_else(|| {
                    Reject::with_detail(ErrorCode::InvalidFormat, "Missing token")
                })?;
                Ok(ClientMessage::Reconnect {
                    token: token.to_string(),
                })
            }
            _ => Err(Reject::new(ErrorCode::UnsupportedType)),
        }
    }
}

/// 服务端发往客户端的消息
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    // === 身份 ===
    /// 登录成功
    LoginOk { player: PlayerId, token: String },
    /// 服务端配置下发（每 3 秒重发直到 CONFIG_ACK）
    Config { turn_timeout_ms: u64 },
    /// 重连成功
    ReconnectOk,
    /// 注销完成
    ByeOk,

    // === 房间 ===
    /// 房间列表为空
    RoomsEmpty,
    /// 房间列表的一行
    Room {
        id: RoomId,
        name: String,
        players: usize,
        status: RoomStatus,
    },
    /// 房间创建成功
    CreateRoomOk { room: RoomId, name: String },
    /// 加入房间成功
    JoinRoomOk { room: RoomId, players: usize },
    /// 离开房间成功
    LeaveRoomOk { room: RoomId },

    // === 对局 ===
    /// 对局开始（每个座位一条，附对手昵称）
    GameStart {
        room: RoomId,
        you: PieceColor,
        opponent: Option<String>,
    },
    /// 对局状态广播
    GameState {
        room: RoomId,
        turn: Turn,
        board: String,
        remaining_ms: i64,
        /// 连吃锁所在格
        lock: Option<Square>,
    },
    /// 对局暂停，附墙钟恢复期限（unix 毫秒）
    GamePaused { room: RoomId, resume_by: u64 },
    /// 对局结束
    GameEnd {
        room: RoomId,
        reason: GameEndReason,
        winner: Winner,
    },
    /// 合法落点查询结果
    LegalMoves {
        room: RoomId,
        from: Square,
        to: Vec<Square>,
        must_capture: bool,
    },

    // === 其他 ===
    /// 心跳应答
    Pong,
    /// 发现服务应答
    Endpoint { host: String, port: u16 },
    /// 错误应答
    Error {
        code: ErrorCode,
        detail: Option<String>,
    },
}

impl ServerMessage {
    /// 编码为一行消息（含结尾换行），id 回显请求的消息 id
    pub fn to_line(&self, id: i64) -> String {
        match self {
            ServerMessage::LoginOk { player, token } => {
                format!("{id};LOGIN_OK;player={player};token={token}\n")
            }
            ServerMessage::Config { turn_timeout_ms } => {
                format!("{id};CONFIG;turnTimeoutMs={turn_timeout_ms}\n")
            }
            ServerMessage::ReconnectOk => format!("{id};RECONNECT_OK\n"),
            ServerMessage::ByeOk => format!("{id};BYE_OK\n"),
            ServerMessage::RoomsEmpty => format!("{id};ROOMS_EMPTY\n"),
            ServerMessage::Room {
                id: room_id,
                name,
                players,
                status,
            } => {
                format!(
                    "{id};ROOM;id={room_id};name={name};players={players};status={}\n",
                    status.as_str()
                )
            }
            ServerMessage::CreateRoomOk { room, name } => {
                format!("{id};CREATE_ROOM_OK;room={room};name={name}\n")
            }
            ServerMessage::JoinRoomOk { room, players } => {
                format!("{id};JOIN_ROOM_OK;room={room};players={players}/{ROOM_CAPACITY}\n")
            }
            ServerMessage::LeaveRoomOk { room } => {
                format!("{id};LEAVE_ROOM_OK;room={room}\n")
            }
            ServerMessage::GameStart {
                room,
                you,
                opponent,
            } => {
                let mut line = format!("{id};GAME_START;room={room};you={}", you.as_str());
                if let Some(nick) = opponent {
                    line.push_str(&format!(";opponent={nick}"));
                }
                line.push('\n');
                line
            }
            ServerMessage::GameState {
                room,
                turn,
                board,
                remaining_ms,
                lock,
            } => {
                let mut line = format!(
                    "{id};GAME_STATE;room={room};turn={};board={board};remainingMs={remaining_ms}",
                    turn.as_str()
                );
                if let Some(sq) = lock {
                    line.push_str(&format!(";lock={sq}"));
                }
                line.push('\n');
                line
            }
            ServerMessage::GamePaused { room, resume_by } => {
                format!("{id};GAME_PAUSED;room={room};resumeBy={resume_by}\n")
            }
            ServerMessage::GameEnd {
                room,
                reason,
                winner,
            } => {
                format!(
                    "{id};GAME_END;room={room};reason={};winner={}\n",
                    reason.as_str(),
                    winner.as_str()
                )
            }
            ServerMessage::LegalMoves {
                room,
                from,
                to,
                must_capture,
            } => {
                let dests = to
                    .iter()
                    .map(Square::to_string)
                    .collect::<Vec<_>>()
                    .join("|");
                format!(
                    "{id};LEGAL_MOVES;room={room};from={from};to={dests};mustCapture={}\n",
                    u8::from(*must_capture)
                )
            }
            ServerMessage::Pong => format!("{id};PONG\n"),
            ServerMessage::Endpoint { host, port } => {
                format!("{id};ENDPOINT;host={host};port={port}\n")
            }
            ServerMessage::Error { code, detail } => match detail {
                Some(text) => format!("{id};ERROR;{code};{text}\n"),
                None => format!("{id};ERROR;{code}\n"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positional_params() {
        let raw = RawMessage::parse("6;MOVE;1;5;0;4;1").unwrap();
        assert_eq!(raw.id, 6);
        assert_eq!(raw.msg_type, "MOVE");
        assert_eq!(raw.params, vec!["1", "5", "0", "4", "1"]);
        assert!(raw.kv.is_empty());
    }

    #[test]
    fn test_parse_kv_params() {
        let raw = RawMessage::parse("0;CONFIG;turnTimeoutMs=60000").unwrap();
        assert_eq!(raw.id, 0);
        assert_eq!(raw.kv.get("turnTimeoutMs").map(String::as_str), Some("60000"));
        // kv 参数同时保留在位置参数里
        assert_eq!(raw.params, vec!["turnTimeoutMs=60000"]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RawMessage::parse("").is_err());
        assert!(RawMessage::parse("abc;LOGIN;x").is_err());
        assert!(RawMessage::parse("1").is_err());
        assert!(RawMessage::parse("1;").is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_line() {
        let line = format!("1;LOGIN;{}", "x".repeat(MAX_DATAGRAM_LEN));
        assert_eq!(
            RawMessage::parse(&line),
            Err(ProtocolError::DatagramTooLong {
                len: line.len(),
                max: MAX_DATAGRAM_LEN,
            })
        );
    }

    #[test]
    fn test_from_raw_login() {
        let raw = RawMessage::parse("1;LOGIN;alice").unwrap();
        assert_eq!(
            ClientMessage::from_raw(&raw),
            Ok(ClientMessage::Login {
                nick: "alice".to_string()
            })
        );

        let raw = RawMessage::parse("1;LOGIN").unwrap();
        let err = ClientMessage::from_raw(&raw).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
        assert_eq!(err.detail.as_deref(), Some("Missing nick"));
    }

    #[test]
    fn test_from_raw_move() {
        let raw = RawMessage::parse("6;MOVE;1;5;0;4;1").unwrap();
        assert_eq!(
            ClientMessage::from_raw(&raw),
            Ok(ClientMessage::Move {
                room_id: 1,
                from: Square::new(5, 0),
                to: Square::new(4, 1),
            })
        );

        let raw = RawMessage::parse("6;MOVE;1;5;0").unwrap();
        let err = ClientMessage::from_raw(&raw).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);

        let raw = RawMessage::parse("6;MOVE;1;x;0;4;1").unwrap();
        let err = ClientMessage::from_raw(&raw).unwrap_err();
        assert_eq!(err.detail.as_deref(), Some("Coordinates must be numbers"));
    }

    #[test]
    fn test_from_raw_unknown_type() {
        let raw = RawMessage::parse("3;WHATEVER").unwrap();
        let err = ClientMessage::from_raw(&raw).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedType);
    }

    #[test]
    fn test_from_raw_join_room() {
        let raw = RawMessage::parse("4;JOIN_ROOM;1").unwrap();
        assert_eq!(
            ClientMessage::from_raw(&raw),
            Ok(ClientMessage::JoinRoom { room_id: 1 })
        );

        let raw = RawMessage::parse("4;JOIN_ROOM;abc").unwrap();
        let err = ClientMessage::from_raw(&raw).unwrap_err();
        assert_eq!(err.detail.as_deref(), Some("roomId must be number"));
    }

    #[test]
    fn test_login_ok_line() {
        let msg = ServerMessage::LoginOk {
            player: 1,
            token: "c0ffee".to_string(),
        };
        assert_eq!(msg.to_line(1), "1;LOGIN_OK;player=1;token=c0ffee\n");
    }

    #[test]
    fn test_game_state_line() {
        let board = ".".repeat(64);
        let msg = ServerMessage::GameState {
            room: 1,
            turn: Turn::Player2,
            board: board.clone(),
            remaining_ms: 60000,
            lock: None,
        };
        assert_eq!(
            msg.to_line(6),
            format!("6;GAME_STATE;room=1;turn=PLAYER2;board={board};remainingMs=60000\n")
        );

        let msg = ServerMessage::GameState {
            room: 1,
            turn: Turn::Player1,
            board,
            remaining_ms: 1500,
            lock: Some(Square::new(3, 4)),
        };
        assert!(msg.to_line(0).ends_with(";remainingMs=1500;lock=3,4\n"));
    }

    #[test]
    fn test_legal_moves_line() {
        let msg = ServerMessage::LegalMoves {
            room: 1,
            from: Square::new(5, 2),
            to: vec![Square::new(4, 1), Square::new(4, 3)],
            must_capture: false,
        };
        assert_eq!(
            msg.to_line(8),
            "8;LEGAL_MOVES;room=1;from=5,2;to=4,1|4,3;mustCapture=0\n"
        );

        let msg = ServerMessage::LegalMoves {
            room: 1,
            from: Square::new(5, 2),
            to: Vec::new(),
            must_capture: true,
        };
        assert_eq!(
            msg.to_line(8),
            "8;LEGAL_MOVES;room=1;from=5,2;to=;mustCapture=1\n"
        );
    }

    #[test]
    fn test_error_line() {
        let msg = ServerMessage::Error {
            code: ErrorCode::MustCapture,
            detail: None,
        };
        assert_eq!(msg.to_line(7), "7;ERROR;MUST_CAPTURE\n");

        let msg = ServerMessage::Error {
            code: ErrorCode::InvalidFormat,
            detail: Some("Missing nick".to_string()),
        };
        assert_eq!(msg.to_line(1), "1;ERROR;INVALID_FORMAT;Missing nick\n");
    }

    #[test]
    fn test_game_end_line() {
        let msg = ServerMessage::GameEnd {
            room: 1,
            reason: GameEndReason::OpponentTimeout,
            winner: Winner::White,
        };
        assert_eq!(
            msg.to_line(0),
            "0;GAME_END;room=1;reason=OPPONENT_TIMEOUT;winner=WHITE\n"
        );
    }

    #[test]
    fn test_strike_classification() {
        assert!(ErrorCode::InvalidFormat.counts_as_strike());
        assert!(ErrorCode::NotYourTurn.counts_as_strike());
        assert!(!ErrorCode::ServerFull.counts_as_strike());
        assert!(!ErrorCode::RoomFull.counts_as_strike());
        assert!(!ErrorCode::RoomNotAvailable.counts_as_strike());
    }
}
