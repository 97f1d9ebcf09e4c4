//! 服务器主逻辑
//!
//! 单写者模型：事件循环独占全部可变状态，处理器同步执行到底，
//! 产生的应答统一进 Outbox，循环末尾一次性发出。定时扫描没有
//! 系统定时器，由每个数据报之后与接收超时唤醒时顺带触发。

use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;
use tracing::{info, warn};

use protocol::{
    ClientMessage, ErrorCode, GameEndReason, PieceColor, ProtocolError, RawMessage, Reject, RoomId,
    RoomStatus, Rules, ServerMessage, Square, Winner, CONFIG_RESEND_INTERVAL, SWEEP_INTERVAL,
};

use crate::config::ServerConfig;
use crate::player::SessionRegistry;
use crate::room::{Room, RoomManager};

/// 服务器状态
pub struct ServerState {
    pub config: ServerConfig,
    pub sessions: SessionRegistry,
    pub rooms: RoomManager,
    last_sweep: Instant,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            sessions: SessionRegistry::new(),
            rooms: RoomManager::new(),
            last_sweep: Instant::now(),
        }
    }

    /// 周期扫描是否到期
    pub fn sweep_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_sweep) >= SWEEP_INTERVAL
    }
}

/// 待发送的数据报
pub struct Outbox {
    datagrams: Vec<(SocketAddr, String)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            datagrams: Vec::new(),
        }
    }

    /// 追加一条应答；id 回显请求的消息 id，服务端主动下发用 0
    pub fn send(&mut self, addr: SocketAddr, id: i64, msg: &ServerMessage) {
        self.datagrams.push((addr, msg.to_line(id)));
    }

    pub fn into_lines(self) -> Vec<(SocketAddr, String)> {
        self.datagrams
    }

    /// 全部发出；发送失败记日志，不回滚已提交的状态
    pub async fn flush(self, socket: &UdpSocket) {
        for (addr, line) in self.datagrams {
            if let Err(e) = socket.send_to(line.as_bytes(), addr).await {
                warn!("发送失败 addr={addr}: {e}");
            }
        }
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 入口：解析数据报、刷新会话、按类型分发
    pub fn handle(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        datagram: &str,
        now: Instant,
    ) {
        // 每个数据报都刷新来源端点对应的会话
        let token = state.sessions.touch(src, now);

        let raw = match RawMessage::parse(datagram.trim_end()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("无法解析消息 src={src}: {e}");
                let detail = match e {
                    ProtocolError::DatagramTooLong { .. } => "Message too long",
                    ProtocolError::Malformed { .. } => "Cannot parse message",
                };
                out.send(
                    src,
                    0,
                    &ServerMessage::Error {
                        code: ErrorCode::InvalidFormat,
                        detail: Some(detail.to_string()),
                    },
                );
                if matches!(e, ProtocolError::Malformed { .. }) {
                    Self::register_strike(state, out, token.as_deref(), now);
                }
                return;
            }
        };

        let msg = match ClientMessage::from_raw(&raw) {
            Ok(msg) => msg,
            Err(reject) => {
                Self::reject(state, out, src, token.as_deref(), raw.id, reject, now);
                return;
            }
        };

        if let Err(reject) = Self::dispatch(state, out, src, token.as_deref(), raw.id, msg, now) {
            Self::reject(state, out, src, token.as_deref(), raw.id, reject, now);
        }
    }

    /// LOGIN、PING、RECONNECT 以外的消息都要求已登录
    fn require_session<'a>(token: Option<&'a str>) -> Result<&'a str, Reject> {
        token.ok_or_else(|| Reject::new(ErrorCode::NotLoggedIn))
    }

    fn dispatch(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        token: Option<&str>,
        id: i64,
        msg: ClientMessage,
        now: Instant,
    ) -> Result<(), Reject> {
        match msg {
            ClientMessage::Login { nick } => Self::handle_login(state, out, src, id, &nick, now),
            ClientMessage::Ping => {
                out.send(src, id, &ServerMessage::Pong);
                Ok(())
            }
            ClientMessage::Reconnect { token: presented } => {
                Self::handle_reconnect(state, out, src, id, &presented, now)
            }
            ClientMessage::ListRooms => {
                Self::require_session(token)?;
                Self::handle_list_rooms(state, out, src, id)
            }
            ClientMessage::CreateRoom { name } => {
                Self::require_session(token)?;
                Self::handle_create_room(state, out, src, id, &name)
            }
            ClientMessage::JoinRoom { room_id } => {
                let token = Self::require_session(token)?.to_string();
                Self::handle_join_room(state, out, src, &token, id, room_id, now)
            }
            ClientMessage::LeaveRoom { room_id } => {
                let token = Self::require_session(token)?.to_string();
                Self::handle_leave_room(state, out, src, &token, id, room_id)
            }
            ClientMessage::Move { room_id, from, to } => {
                let token = Self::require_session(token)?.to_string();
                Self::handle_move(state, out, &token, id, room_id, from, to, now)
            }
            ClientMessage::LegalMoves { room_id, square } => {
                let token = Self::require_session(token)?.to_string();
                Self::handle_legal_moves(state, out, src, &token, id, room_id, square)
            }
            ClientMessage::Bye => {
                let token = Self::require_session(token)?.to_string();
                Self::handle_bye(state, out, src, &token, id)
            }
            ClientMessage::ConfigAck => {
                let token = Self::require_session(token)?.to_string();
                if let Some(session) = state.sessions.get_mut(&token) {
                    session.config_acked = true;
                }
                Ok(())
            }
        }
    }

    /// 发出错误应答；可归属会话且错误码计数时记一次无效消息
    fn reject(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        token: Option<&str>,
        id: i64,
        reject: Reject,
        now: Instant,
    ) {
        let counts = reject.code.counts_as_strike();
        out.send(
            src,
            id,
            &ServerMessage::Error {
                code: reject.code,
                detail: reject.detail,
            },
        );
        if counts {
            Self::register_strike(state, out, token, now);
        }
    }

    /// 无效消息计数；达到上限则断开会话
    fn register_strike(
        state: &mut ServerState,
        out: &mut Outbox,
        token: Option<&str>,
        now: Instant,
    ) {
        let Some(token) = token else {
            return;
        };
        let Some(session) = state.sessions.get_mut(token) else {
            return;
        };

        let limit_reached = session.register_invalid(now);
        warn!(
            "无效消息 player={} count={}",
            session.id,
            session.invalid_count()
        );

        if limit_reached {
            warn!("无效消息达到上限，断开 player={}", session.id);
            Self::drop_session(state, out, token);
        }
    }

    /// 强制移除会话：对局中的房间按对方离开收场，其余座位清空
    fn drop_session(state: &mut ServerState, out: &mut Outbox, token: &str) {
        for room_id in state.rooms.rooms_with_player(token) {
            let Some(room) = state.rooms.get_mut(room_id) else {
                continue;
            };
            if room.status == RoomStatus::InGame {
                Self::send_game_end(
                    out,
                    room,
                    &state.sessions,
                    0,
                    GameEndReason::OpponentLeft,
                    Winner::None,
                );
                room.reset();
            } else {
                room.remove_seat(token);
                if room.seats.is_empty() {
                    room.reset();
                }
            }
        }
        state.sessions.remove(token);
    }

    /// LOGIN：同端点重复登录幂等，换昵称拒绝，超限拒绝
    fn handle_login(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        id: i64,
        nick: &str,
        now: Instant,
    ) -> Result<(), Reject> {
        SessionRegistry::validate_nick(nick)
            .map_err(|reason| Reject::with_detail(ErrorCode::InvalidFormat, reason))?;

        if let Some(existing) = state.sessions.token_for_endpoint(&src).map(str::to_string) {
            if let Some(session) = state.sessions.get(&existing) {
                if session.nick != nick {
                    info!("登录被拒 addr={src}（昵称与现有会话不符）");
                    return Err(Reject::new(ErrorCode::AlreadyLoggedIn));
                }
                out.send(
                    src,
                    id,
                    &ServerMessage::LoginOk {
                        player: session.id,
                        token: session.token.clone(),
                    },
                );
                let turn_timeout_ms = state.config.turn_timeout_ms;
                Self::send_config(state, out, &existing, now, turn_timeout_ms);
                return Ok(());
            }
        }

        if state.sessions.count() >= state.config.max_players {
            return Err(Reject::with_detail(
                ErrorCode::ServerFull,
                "Players limit reached",
            ));
        }

        let (player_id, token) = state.sessions.login(nick.to_string(), src, now);
        out.send(
            src,
            id,
            &ServerMessage::LoginOk {
                player: player_id,
                token: token.clone(),
            },
        );
        let turn_timeout_ms = state.config.turn_timeout_ms;
        Self::send_config(state, out, &token, now, turn_timeout_ms);

        info!("新玩家登录 id={player_id} nick={nick} addr={src}");
        Ok(())
    }

    /// 下发 CONFIG 并记录发送时间（周期扫描据此重发）
    fn send_config(
        state: &mut ServerState,
        out: &mut Outbox,
        token: &str,
        now: Instant,
        turn_timeout_ms: u64,
    ) {
        if let Some(session) = state.sessions.get_mut(token) {
            out.send(session.addr, 0, &ServerMessage::Config { turn_timeout_ms });
            session.last_config_sent = Some(now);
        }
    }

    /// RECONNECT：持 token 从任意端点恢复会话
    fn handle_reconnect(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        id: i64,
        token: &str,
        now: Instant,
    ) -> Result<(), Reject> {
        let Some(session) = state.sessions.get(token) else {
            return Err(Reject::new(ErrorCode::TokenNotFound));
        };
        if let Some(deadline) = session.resume_deadline {
            if now > deadline {
                return Err(Reject::new(ErrorCode::TokenExpired));
            }
        }

        state.sessions.bind_endpoint(src, token);
        if let Some(session) = state.sessions.get_mut(token) {
            session.addr = src;
            session.connected = true;
            session.paused = false;
            session.resume_deadline = None;
            session.last_seen = now;
            info!("玩家重连 player={} addr={src}", session.id);
        }
        out.send(src, id, &ServerMessage::ReconnectOk);

        // 逐个恢复该玩家占用的对局
        let turn_timeout_ms = state.config.turn_timeout_ms;
        let window = Duration::from_millis(state.config.reconnect_window_ms);
        for room_id in state.rooms.rooms_with_player(token) {
            let all_seated_connected = {
                let Some(room) = state.rooms.get(room_id) else {
                    continue;
                };
                if room.status != RoomStatus::InGame {
                    continue;
                }
                room.seats.iter().all(|seat| {
                    state
                        .sessions
                        .get(seat)
                        .map_or(false, |s| s.connected && !s.paused)
                })
            };

            let Some(room) = state.rooms.get_mut(room_id) else {
                continue;
            };
            if all_seated_connected {
                // 两个座位都在线：解冻回合时钟并广播最新状态
                room.clock.resume(now, turn_timeout_ms);
                Self::broadcast_game_state(out, room, &state.sessions, now, turn_timeout_ms, 0);
            } else {
                // 对手仍未归队：只告知重连者继续等
                let resume_by = room
                    .seats
                    .iter()
                    .filter_map(|seat| state.sessions.get(seat))
                    .filter(|s| s.paused)
                    .filter_map(|s| s.resume_deadline)
                    .max()
                    .map(|deadline| Self::wall_clock_after(deadline.saturating_duration_since(now)))
                    .unwrap_or_else(|| Self::wall_clock_after(window));
                out.send(
                    src,
                    0,
                    &ServerMessage::GamePaused {
                        room: room_id,
                        resume_by,
                    },
                );
            }
        }

        Ok(())
    }

    /// LIST_ROOMS：空列表单发 ROOMS_EMPTY，否则逐房间一行
    fn handle_list_rooms(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        id: i64,
    ) -> Result<(), Reject> {
        let rooms = state.rooms.list();
        if rooms.is_empty() {
            out.send(src, id, &ServerMessage::RoomsEmpty);
            return Ok(());
        }

        for room in rooms {
            out.send(
                src,
                id,
                &ServerMessage::Room {
                    id: room.id,
                    name: room.name.clone(),
                    players: room.seats.len(),
                    status: room.status,
                },
            );
        }
        Ok(())
    }

    /// CREATE_ROOM：名称校验后由服务端重新命名
    fn handle_create_room(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        id: i64,
        name: &str,
    ) -> Result<(), Reject> {
        RoomManager::validate_name(name)
            .map_err(|reason| Reject::with_detail(ErrorCode::InvalidFormat, reason))?;

        if state.rooms.count() >= state.config.max_rooms {
            return Err(Reject::with_detail(
                ErrorCode::ServerFull,
                "Rooms limit reached",
            ));
        }

        let room_id = state.rooms.create();
        let Some(room) = state.rooms.get(room_id) else {
            return Ok(());
        };
        out.send(
            src,
            id,
            &ServerMessage::CreateRoomOk {
                room: room_id,
                name: room.name.clone(),
            },
        );
        info!("创建房间 room={} name={}", room_id, room.name);
        Ok(())
    }

    /// JOIN_ROOM：第二个座位坐满即开局
    fn handle_join_room(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        token: &str,
        id: i64,
        room_id: RoomId,
        now: Instant,
    ) -> Result<(), Reject> {
        let turn_timeout_ms = state.config.turn_timeout_ms;
        let Some(room) = state.rooms.get_mut(room_id) else {
            return Err(Reject::new(ErrorCode::RoomNotFound));
        };

        if room.status != RoomStatus::Waiting {
            return Err(Reject::new(ErrorCode::RoomNotAvailable));
        }
        if room.is_full() && !room.has_player(token) {
            return Err(Reject::new(ErrorCode::RoomFull));
        }

        room.add_seat(token);
        out.send(
            src,
            id,
            &ServerMessage::JoinRoomOk {
                room: room_id,
                players: room.seats.len(),
            },
        );
        info!(
            "加入房间 room={} players={}/{}",
            room_id,
            room.seats.len(),
            protocol::ROOM_CAPACITY
        );

        if room.is_full() {
            room.start_game(now);

            // 每个座位各收一条 GAME_START（附角色与对手昵称）
            for (index, seat) in room.seats.iter().enumerate() {
                let Some(player) = state.sessions.get(seat) else {
                    continue;
                };
                let opponent = room
                    .seats
                    .get(1 - index)
                    .and_then(|other| state.sessions.get(other))
                    .map(|other| other.nick.clone());
                out.send(
                    player.addr,
                    id,
                    &ServerMessage::GameStart {
                        room: room_id,
                        you: Room::seat_color(index),
                        opponent,
                    },
                );
            }

            Self::broadcast_game_state(out, room, &state.sessions, now, turn_timeout_ms, id);
            info!("开局 room={room_id}");
        }

        Ok(())
    }

    /// LEAVE_ROOM：对局中离开判对方胜
    fn handle_leave_room(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        token: &str,
        id: i64,
        room_id: RoomId,
    ) -> Result<(), Reject> {
        let Some(room) = state.rooms.get_mut(room_id) else {
            return Err(Reject::new(ErrorCode::RoomNotFound));
        };

        let Some(seat_index) = room.remove_seat(token) else {
            return Err(Reject::new(ErrorCode::NotInRoom));
        };

        out.send(src, id, &ServerMessage::LeaveRoomOk { room: room_id });
        info!("离开房间 room={room_id}");

        if room.seats.is_empty() {
            room.reset();
            return Ok(());
        }

        if room.status == RoomStatus::InGame {
            let winner = if seat_index == 0 {
                Winner::Black
            } else {
                Winner::White
            };
            Self::send_game_end(
                out,
                room,
                &state.sessions,
                id,
                GameEndReason::OpponentLeft,
                winner,
            );
            room.reset();
        }

        Ok(())
    }

    /// MOVE：校验、落子、连吃判定、胜负判定
    fn handle_move(
        state: &mut ServerState,
        out: &mut Outbox,
        token: &str,
        id: i64,
        room_id: RoomId,
        from: Square,
        to: Square,
        now: Instant,
    ) -> Result<(), Reject> {
        let turn_timeout_ms = state.config.turn_timeout_ms;
        let Some(room) = state.rooms.get_mut(room_id) else {
            return Err(Reject::new(ErrorCode::RoomNotFound));
        };
        if room.status != RoomStatus::InGame {
            return Err(Reject::new(ErrorCode::RoomNotInGame));
        }
        let Some(seat_index) = room.seat_index(token) else {
            return Err(Reject::new(ErrorCode::NotInRoom));
        };

        // MOVE 去重：重复或乱序的旧 id 静默成功
        let Some(session) = state.sessions.get_mut(token) else {
            return Err(Reject::new(ErrorCode::NotLoggedIn));
        };
        if id <= session.last_move_msg_id {
            return Ok(());
        }
        session.last_move_msg_id = id;

        if room.turn_seat() != Some(seat_index) {
            return Err(Reject::new(ErrorCode::NotYourTurn));
        }
        if Self::room_has_paused_player(room, &state.sessions) {
            return Err(Reject::new(ErrorCode::GamePaused));
        }
        if let Some(lock) = room.capture_lock {
            if lock != from {
                return Err(Reject::new(ErrorCode::MustContinueCapture));
            }
        }

        let mover = Room::seat_color(seat_index);
        let (outcome, capture_continues, opponent_has_pieces, opponent_has_moves) = {
            let Some(board) = room.board.as_mut() else {
                return Err(Reject::new(ErrorCode::RoomNotInGame));
            };
            let capture_available = Rules::side_has_capture(board, mover);
            let planned = Rules::validate(board, mover, from, to, capture_available)
                .map_err(Reject::from)?;
            let outcome = Rules::apply(board, &planned);
            let continues = outcome.captured.is_some() && Rules::can_capture_from(board, to);
            let opponent = mover.opponent();
            (
                outcome,
                continues,
                Rules::side_has_piece(board, opponent),
                Rules::side_has_any_move(board, opponent),
            )
        };

        // 连吃：锁定落点、不换行棋方；否则轮转
        if capture_continues {
            room.capture_lock = Some(to);
        } else {
            room.capture_lock = None;
            room.turn = room.turn.other();
        }
        room.clock.start(now);

        info!(
            "落子 room={} from={} to={} player={} capture={} king={}",
            room_id,
            from,
            to,
            seat_index + 1,
            outcome.captured.is_some(),
            outcome.piece.king,
        );

        Self::broadcast_game_state(out, room, &state.sessions, now, turn_timeout_ms, id);

        if !opponent_has_pieces {
            let reason = match mover {
                PieceColor::White => GameEndReason::WhiteWinNoPieces,
                PieceColor::Black => GameEndReason::BlackWinNoPieces,
            };
            Self::send_game_end(out, room, &state.sessions, id, reason, mover.into());
            room.reset();
        } else if !opponent_has_moves {
            let reason = match mover {
                PieceColor::White => GameEndReason::WhiteWinNoMoves,
                PieceColor::Black => GameEndReason::BlackWinNoMoves,
            };
            Self::send_game_end(out, room, &state.sessions, id, reason, mover.into());
            room.reset();
        }

        Ok(())
    }

    /// LEGAL_MOVES：给出指定格的全部落点与强制吃子标记
    fn handle_legal_moves(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        token: &str,
        id: i64,
        room_id: RoomId,
        square: Square,
    ) -> Result<(), Reject> {
        let Some(room) = state.rooms.get(room_id) else {
            return Err(Reject::new(ErrorCode::RoomNotFound));
        };
        if room.status != RoomStatus::InGame {
            return Err(Reject::new(ErrorCode::RoomNotInGame));
        }
        let Some(seat_index) = room.seat_index(token) else {
            return Err(Reject::new(ErrorCode::NotInRoom));
        };
        if Self::room_has_paused_player(room, &state.sessions) {
            return Err(Reject::new(ErrorCode::GamePaused));
        }
        if !square.in_board() || !square.is_dark() {
            return Err(Reject::new(ErrorCode::InvalidSquare));
        }
        if let Some(lock) = room.capture_lock {
            if lock != square {
                return Err(Reject::new(ErrorCode::MustContinueCapture));
            }
        }

        let Some(board) = room.board.as_ref() else {
            return Err(Reject::new(ErrorCode::RoomNotInGame));
        };
        let Some(piece) = board.get(square) else {
            return Err(Reject::new(ErrorCode::NoPiece));
        };
        let color = Room::seat_color(seat_index);
        if piece.color != color {
            return Err(Reject::new(ErrorCode::NotYourPiece));
        }

        // 全局有吃子机会时，只允许报吃子落点；该子吃不了则落点为空
        let global_capture =
            Rules::side_has_capture(board, color) || room.capture_lock.is_some();
        let captures = Rules::capture_moves(board, square);
        let (dests, must_capture) = if !captures.is_empty() {
            (captures, true)
        } else if global_capture {
            (Vec::new(), true)
        } else {
            (Rules::simple_moves(board, square), false)
        };

        out.send(
            src,
            id,
            &ServerMessage::LegalMoves {
                room: room_id,
                from: square,
                to: dests,
                must_capture,
            },
        );
        Ok(())
    }

    /// BYE：清理会话并结束其占用的对局；会话已不存在时幂等
    fn handle_bye(
        state: &mut ServerState,
        out: &mut Outbox,
        src: SocketAddr,
        token: &str,
        id: i64,
    ) -> Result<(), Reject> {
        if state.sessions.get(token).is_none() {
            out.send(src, id, &ServerMessage::ByeOk);
            return Ok(());
        }

        for room_id in state.rooms.rooms_with_player(token) {
            let Some(room) = state.rooms.get_mut(room_id) else {
                continue;
            };
            if room.status == RoomStatus::InGame {
                Self::send_game_end(
                    out,
                    room,
                    &state.sessions,
                    id,
                    GameEndReason::OpponentLeft,
                    Winner::None,
                );
            }
            room.reset();
        }

        state.sessions.remove(token);
        out.send(src, id, &ServerMessage::ByeOk);
        info!("玩家注销 addr={src}");
        Ok(())
    }

    // === 周期扫描 ===

    /// 五趟扫描按序执行：停摆冻结、心跳超时、回合超时、重连过期、
    /// 孤儿房间清理；最后集中补发 CONFIG。
    pub fn sweep(state: &mut ServerState, out: &mut Outbox, now: Instant) {
        state.last_sweep = now;
        let config = state.config.clone();

        Self::sweep_outage_freeze(state, now, &config);
        Self::sweep_heartbeats(state, out, now, &config);
        Self::sweep_turn_timeouts(state, out, now, &config);
        Self::sweep_reconnect_expiry(state, out, now);
        Self::sweep_orphaned_rooms(state, now);
        Self::sweep_config_resend(state, out, now, &config);
    }

    /// 1. 服务端停摆检测：对局所有座位都久未露面时冻结回合时钟，
    ///    以最后一次收包时间为冻结时刻，避免把停摆时间算进回合。
    fn sweep_outage_freeze(state: &mut ServerState, now: Instant, config: &ServerConfig) {
        let threshold = Duration::from_millis(config.pause_threshold_ms());

        for room_id in state.rooms.ids() {
            let Some(room) = state.rooms.get_mut(room_id) else {
                continue;
            };
            if room.status != RoomStatus::InGame
                || !room.clock.is_running()
                || room.seats.is_empty()
            {
                continue;
            }

            let mut any_player = false;
            let mut all_stale = true;
            let mut freeze_at: Option<Instant> = None;
            for seat in &room.seats {
                let Some(session) = state.sessions.get(seat) else {
                    continue;
                };
                any_player = true;
                if freeze_at.map_or(true, |t| session.last_seen > t) {
                    freeze_at = Some(session.last_seen);
                }
                if now.saturating_duration_since(session.last_seen) <= threshold {
                    all_stale = false;
                    break;
                }
            }

            if any_player && all_stale {
                room.clock
                    .freeze(freeze_at.unwrap_or(now), config.turn_timeout_ms);
                info!("停摆冻结 room={room_id}");
            }
        }
    }

    /// 2. 心跳超时：会话转入宽限期，占用的对局暂停
    fn sweep_heartbeats(
        state: &mut ServerState,
        out: &mut Outbox,
        now: Instant,
        config: &ServerConfig,
    ) {
        let heartbeat = Duration::from_millis(config.effective_heartbeat_ms());
        let window = Duration::from_millis(config.reconnect_window_ms);

        let stale: Vec<String> = state
            .sessions
            .iter()
            .filter(|s| !s.paused && now.saturating_duration_since(s.last_seen) > heartbeat)
            .map(|s| s.token.clone())
            .collect();

        for token in stale {
            if let Some(session) = state.sessions.get_mut(&token) {
                warn!("心跳超时 player={} nick={}", session.id, session.nick);
                session.connected = false;
                session.paused = true;
                session.resume_deadline = Some(now + window);
            }

            for room_id in state.rooms.rooms_with_player(&token) {
                let Some(room) = state.rooms.get_mut(room_id) else {
                    continue;
                };
                if room.status == RoomStatus::InGame {
                    Self::pause_room(room, &mut state.sessions, out, config, now, &token);
                } else {
                    room.remove_seat(&token);
                    if room.seats.is_empty() {
                        room.reset();
                    }
                }
            }
        }
    }

    /// 3. 回合超时：行棋方判负
    fn sweep_turn_timeouts(
        state: &mut ServerState,
        out: &mut Outbox,
        now: Instant,
        config: &ServerConfig,
    ) {
        for room_id in state.rooms.ids() {
            let Some(room) = state.rooms.get_mut(room_id) else {
                continue;
            };
            if room.status != RoomStatus::InGame {
                continue;
            }
            if !room.clock.expired(now, config.turn_timeout_ms) {
                continue;
            }

            warn!("回合超时 room={room_id}");
            let winner = match room.turn_seat() {
                Some(seat) if room.seats.len() > 1 => match Room::seat_color(1 - seat) {
                    PieceColor::White => Winner::White,
                    PieceColor::Black => Winner::Black,
                },
                _ => Winner::None,
            };
            Self::send_game_end(
                out,
                room,
                &state.sessions,
                0,
                GameEndReason::TurnTimeout,
                winner,
            );
            room.reset();
        }
    }

    /// 4. 重连窗口到期：删除会话，对局按对手存活与否定胜负
    fn sweep_reconnect_expiry(state: &mut ServerState, out: &mut Outbox, now: Instant) {
        let expired: Vec<String> = state
            .sessions
            .iter()
            .filter(|s| s.paused && s.resume_deadline.map_or(false, |d| now > d))
            .map(|s| s.token.clone())
            .collect();

        for token in expired {
            warn!("重连窗口超时 token 过期");
            for room_id in state.rooms.rooms_with_player(&token) {
                let Some(room) = state.rooms.get_mut(room_id) else {
                    continue;
                };
                if room.status == RoomStatus::InGame && !room.seats.is_empty() {
                    // 对手仍存活（未暂停，或暂停但期限未到）才判对手胜
                    let winner = if room.seats.len() >= 2 {
                        let expired_index = room.seat_index(&token).unwrap_or(0);
                        let opponent_seat = 1 - expired_index;
                        room.seats
                            .get(opponent_seat)
                            .and_then(|seat| state.sessions.get(seat))
                            .filter(|opp| {
                                !opp.paused || opp.resume_deadline.map_or(true, |d| d > now)
                            })
                            .map(|_| match Room::seat_color(opponent_seat) {
                                PieceColor::White => Winner::White,
                                PieceColor::Black => Winner::Black,
                            })
                            .unwrap_or(Winner::None)
                    } else {
                        Winner::None
                    };
                    Self::send_game_end(
                        out,
                        room,
                        &state.sessions,
                        0,
                        GameEndReason::OpponentTimeout,
                        winner,
                    );
                }
                room.reset();
            }
            state.sessions.remove(&token);
        }
    }

    /// 5. 孤儿房间清理：没有在线座位且所有宽限期都已过的对局直接重置
    fn sweep_orphaned_rooms(state: &mut ServerState, now: Instant) {
        for room_id in state.rooms.ids() {
            let Some(room) = state.rooms.get(room_id) else {
                continue;
            };
            if room.status != RoomStatus::InGame {
                continue;
            }

            let any_connected = room
                .seats
                .iter()
                .any(|seat| state.sessions.get(seat).map_or(false, |s| s.connected));
            if any_connected {
                continue;
            }

            let all_expired = room.seats.iter().all(|seat| {
                state
                    .sessions
                    .get(seat)
                    .map_or(true, |s| s.resume_deadline.map_or(false, |d| d <= now))
            });
            if all_expired {
                if let Some(room) = state.rooms.get_mut(room_id) {
                    room.reset();
                    info!("清理孤儿房间 room={room_id}");
                }
            }
        }
    }

    /// 6. CONFIG 重发：未确认的在线会话每 3 秒补发一次
    fn sweep_config_resend(
        state: &mut ServerState,
        out: &mut Outbox,
        now: Instant,
        config: &ServerConfig,
    ) {
        let due: Vec<String> = state
            .sessions
            .iter()
            .filter(|s| s.connected && !s.config_acked)
            .filter(|s| {
                s.last_config_sent
                    .map_or(true, |t| now.saturating_duration_since(t) >= CONFIG_RESEND_INTERVAL)
            })
            .map(|s| s.token.clone())
            .collect();

        for token in due {
            Self::send_config(state, out, &token, now, config.turn_timeout_ms);
        }
    }

    // === 公共辅助 ===

    /// 房间里是否有暂停或掉线的座位
    fn room_has_paused_player(room: &Room, sessions: &SessionRegistry) -> bool {
        room.seats.iter().any(|seat| {
            sessions
                .get(seat)
                .map_or(true, |s| s.paused || !s.connected)
        })
    }

    /// 暂停对局：冻结回合时钟，掉线座位进宽限期，在线座位收 GAME_PAUSED
    fn pause_room(
        room: &mut Room,
        sessions: &mut SessionRegistry,
        out: &mut Outbox,
        config: &ServerConfig,
        now: Instant,
        offender: &str,
    ) {
        room.clock.freeze(now, config.turn_timeout_ms);

        let window = Duration::from_millis(config.reconnect_window_ms);
        let resume_by = Self::wall_clock_after(window);

        for seat in &room.seats {
            let Some(session) = sessions.get_mut(seat) else {
                continue;
            };
            if seat.as_str() == offender {
                session.connected = false;
                session.paused = true;
                session.resume_deadline = Some(now + window);
            } else if !session.connected {
                session.paused = true;
                session.resume_deadline = Some(now + window);
            }
        }

        for seat in &room.seats {
            let Some(session) = sessions.get(seat) else {
                continue;
            };
            if session.connected {
                out.send(
                    session.addr,
                    0,
                    &ServerMessage::GamePaused {
                        room: room.id,
                        resume_by,
                    },
                );
            }
        }

        info!("对局暂停 room={} resumeBy={resume_by}", room.id);
    }

    /// 给房间全部座位广播 GAME_STATE
    fn broadcast_game_state(
        out: &mut Outbox,
        room: &Room,
        sessions: &SessionRegistry,
        now: Instant,
        turn_timeout_ms: u64,
        id: i64,
    ) {
        let Some(board) = room.board.as_ref() else {
            return;
        };
        let board_wire = board.to_wire();
        let remaining_ms = room.clock.remaining_ms(now, turn_timeout_ms);

        for seat in &room.seats {
            let Some(session) = sessions.get(seat) else {
                continue;
            };
            out.send(
                session.addr,
                id,
                &ServerMessage::GameState {
                    room: room.id,
                    turn: room.turn,
                    board: board_wire.clone(),
                    remaining_ms,
                    lock: room.capture_lock,
                },
            );
        }
    }

    /// 给房间全部座位发 GAME_END 并把房间标为终局
    fn send_game_end(
        out: &mut Outbox,
        room: &mut Room,
        sessions: &SessionRegistry,
        id: i64,
        reason: GameEndReason,
        winner: Winner,
    ) {
        room.status = RoomStatus::Finished;
        room.turn = protocol::Turn::None;
        room.capture_lock = None;

        for seat in &room.seats {
            let Some(session) = sessions.get(seat) else {
                continue;
            };
            out.send(
                session.addr,
                id,
                &ServerMessage::GameEnd {
                    room: room.id,
                    reason,
                    winner,
                },
            );
        }

        info!(
            "对局结束 room={} reason={} winner={}",
            room.id,
            reason.as_str(),
            winner.as_str()
        );
    }

    /// 当前墙钟时间加偏移，unix 毫秒（GAME_PAUSED 的 resumeBy）
    fn wall_clock_after(offset: Duration) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(offset)
            .as_millis() as u64
    }
}
