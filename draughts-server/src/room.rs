//! 房间系统

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use protocol::{
    Board, PieceColor, RoomId, RoomStatus, Square, Turn, MAX_ROOM_NAME_LEN, ROOM_CAPACITY,
};

use crate::game::TurnClock;

/// 房间：一张两人对局桌，终局后重置回等待状态复用
pub struct Room {
    pub id: RoomId,
    /// 服务端生成的名称（"Table N"）
    pub name: String,
    pub status: RoomStatus,
    /// 座位上的玩家 token；0 号位执白，1 号位执黑
    pub seats: Vec<String>,
    pub turn: Turn,
    /// 对局中的棋盘；等待状态为 None
    pub board: Option<Board>,
    /// 连吃锁：上一步吃子后必须从此格继续吃
    pub capture_lock: Option<Square>,
    /// 回合计时
    pub clock: TurnClock,
}

impl Room {
    pub fn new(id: RoomId, name: String) -> Self {
        Self {
            id,
            name,
            status: RoomStatus::Waiting,
            seats: Vec::with_capacity(ROOM_CAPACITY),
            turn: Turn::None,
            board: None,
            capture_lock: None,
            clock: TurnClock::idle(),
        }
    }

    /// 座位是否已满
    pub fn is_full(&self) -> bool {
        self.seats.len() >= ROOM_CAPACITY
    }

    /// 玩家是否在房间中
    pub fn has_player(&self, token: &str) -> bool {
        self.seats.iter().any(|seat| seat == token)
    }

    /// 玩家的座位号
    pub fn seat_index(&self, token: &str) -> Option<usize> {
        self.seats.iter().position(|seat| seat == token)
    }

    /// 座位对应的棋色：0 号白，1 号黑
    pub fn seat_color(index: usize) -> PieceColor {
        if index == 0 {
            PieceColor::White
        } else {
            PieceColor::Black
        }
    }

    /// 对手的 token
    pub fn opponent_token(&self, token: &str) -> Option<&str> {
        let index = self.seat_index(token)?;
        self.seats.get(1 - index).map(String::as_str)
    }

    /// 行棋方的座位号
    pub fn turn_seat(&self) -> Option<usize> {
        match self.turn {
            Turn::Player1 => Some(0),
            Turn::Player2 => Some(1),
            Turn::None => None,
        }
    }

    /// 加入座位；已在座为幂等
    pub fn add_seat(&mut self, token: &str) {
        if !self.has_player(token) {
            self.seats.push(token.to_string());
        }
    }

    /// 空出座位，返回原座位号
    pub fn remove_seat(&mut self, token: &str) -> Option<usize> {
        let index = self.seat_index(token)?;
        self.seats.remove(index);
        Some(index)
    }

    /// 开局：摆初始棋盘，白方先行，启动回合计时
    pub fn start_game(&mut self, now: Instant) {
        self.status = RoomStatus::InGame;
        self.turn = Turn::Player1;
        self.board = Some(Board::initial());
        self.capture_lock = None;
        self.clock.start(now);
    }

    /// 重置回等待状态（终局或清场）
    pub fn reset(&mut self) {
        self.status = RoomStatus::Waiting;
        self.turn = Turn::None;
        self.board = None;
        self.capture_lock = None;
        self.clock = TurnClock::idle();
        self.seats.clear();
    }
}

/// 房间管理器
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,
    next_id: AtomicU64,
    /// "Table N" 的编号与房间 id 独立递增
    next_table_index: AtomicU64,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            next_id: AtomicU64::new(1),
            next_table_index: AtomicU64::new(1),
        }
    }

    /// 校验客户端提交的房间名（最终会被服务端命名替换，但仍须合法）
    pub fn validate_name(name: &str) -> Result<(), &'static str> {
        if name.is_empty() {
            return Err("Missing room name");
        }
        if name.contains(';') || name.contains('=') {
            return Err("Invalid chars in room name");
        }
        if name.len() > MAX_ROOM_NAME_LEN {
            return Err("Room name too long");
        }
        Ok(())
    }

    /// 创建房间，返回房间 id
    pub fn create(&mut self) -> RoomId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let table = self.next_table_index.fetch_add(1, Ordering::SeqCst);
        let room = Room::new(id, format!("Table {table}"));
        self.rooms.insert(id, room);
        id
    }

    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn get_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    /// 房间数量
    pub fn count(&self) -> usize {
        self.rooms.len()
    }

    /// 按 id 升序返回全部房间（列表展示）
    pub fn list(&self) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self.rooms.values().collect();
        rooms.sort_by_key(|room| room.id);
        rooms
    }

    /// 全部房间 id（扫描时先收集再逐个可变借用）
    pub fn ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }

    /// 玩家占用的全部房间 id
    pub fn rooms_with_player(&self, token: &str) -> Vec<RoomId> {
        self.rooms
            .values()
            .filter(|room| room.has_player(token))
            .map(|room| room.id)
            .collect()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
