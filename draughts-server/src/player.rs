//! 会话管理
//!
//! token -> 会话 是权威映射，endpoint -> token 只作索引。
//! 客户端换地址重连（NAT 重绑）时更新索引，身份不丢。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use protocol::{PlayerId, INVALID_MSG_LIMIT, INVALID_MSG_WINDOW, MAX_NICK_LEN};

/// 玩家会话
#[derive(Debug, Clone)]
pub struct Session {
    pub id: PlayerId,
    pub nick: String,
    /// 重连令牌：64 位随机数的十六进制
    pub token: String,
    /// 当前传输地址（每个数据报都可能刷新）
    pub addr: SocketAddr,
    pub connected: bool,
    /// 处于断线宽限期
    pub paused: bool,
    /// 最后一次收到数据报的时间
    pub last_seen: Instant,
    /// 宽限期截止；None 表示不在宽限期
    pub resume_deadline: Option<Instant>,
    /// 已处理 MOVE 的最大消息 id（重复数据报去重）
    pub last_move_msg_id: i64,
    /// 无效消息计数
    invalid_count: u32,
    invalid_window_start: Option<Instant>,
    /// 客户端是否已确认 CONFIG
    pub config_acked: bool,
    pub last_config_sent: Option<Instant>,
}

impl Session {
    fn new(id: PlayerId, nick: String, token: String, addr: SocketAddr, now: Instant) -> Self {
        Self {
            id,
            nick,
            token,
            addr,
            connected: true,
            paused: false,
            last_seen: now,
            resume_deadline: None,
            last_move_msg_id: -1,
            invalid_count: 0,
            invalid_window_start: None,
            config_acked: false,
            last_config_sent: None,
        }
    }

    /// 记一次无效消息；返回是否达到断开上限
    ///
    /// 窗口过期则重新开窗计数。
    pub fn register_invalid(&mut self, now: Instant) -> bool {
        let window_expired = self
            .invalid_window_start
            .map_or(true, |start| now.saturating_duration_since(start) > INVALID_MSG_WINDOW);
        if window_expired {
            self.invalid_count = 0;
            self.invalid_window_start = Some(now);
        }

        self.invalid_count += 1;
        self.invalid_count >= INVALID_MSG_LIMIT
    }

    pub fn invalid_count(&self) -> u32 {
        self.invalid_count
    }
}

/// 会话注册表
pub struct SessionRegistry {
    /// token -> 会话（权威）
    sessions: HashMap<String, Session>,
    /// endpoint -> token（索引）
    endpoints: HashMap<SocketAddr, String>,
    /// ID 生成器
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            endpoints: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// 生成新的玩家 ID
    fn generate_id(&self) -> PlayerId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 生成在活跃会话中唯一的令牌
    fn generate_token(&self) -> String {
        loop {
            let token = format!("{:x}", rand::random::<u64>());
            if !self.sessions.contains_key(&token) {
                return token;
            }
        }
    }

    /// 校验昵称：非空、不超过 64 字节、不含分隔符
    pub fn validate_nick(nick: &str) -> Result<(), &'static str> {
        if nick.is_empty() {
            return Err("Missing nick");
        }
        if nick.contains(';') || nick.contains('=') {
            return Err("Invalid chars in nick");
        }
        if nick.len() > MAX_NICK_LEN {
            return Err("Nick too long");
        }
        Ok(())
    }

    /// 登录：分配 id 与 token，建立端点绑定
    pub fn login(&mut self, nick: String, addr: SocketAddr, now: Instant) -> (PlayerId, String) {
        let id = self.generate_id();
        let token = self.generate_token();
        let session = Session::new(id, nick, token.clone(), addr, now);
        self.sessions.insert(token.clone(), session);
        self.endpoints.insert(addr, token.clone());
        (id, token)
    }

    pub fn get(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    pub fn get_mut(&mut self, token: &str) -> Option<&mut Session> {
        self.sessions.get_mut(token)
    }

    /// 端点当前绑定的 token
    pub fn token_for_endpoint(&self, addr: &SocketAddr) -> Option<&str> {
        self.endpoints.get(addr).map(String::as_str)
    }

    /// 把端点绑定到 token，并清掉指向同一 token 的旧端点
    pub fn bind_endpoint(&mut self, addr: SocketAddr, token: &str) {
        self.endpoints.retain(|_, bound| bound.as_str() != token);
        self.endpoints.insert(addr, token.to_string());
    }

    /// 收到该端点的数据报：刷新 last_seen 与地址，返回绑定的 token
    pub fn touch(&mut self, addr: SocketAddr, now: Instant) -> Option<String> {
        let token = self.endpoints.get(&addr)?.clone();
        if let Some(session) = self.sessions.get_mut(&token) {
            session.last_seen = now;
            session.connected = true;
            session.addr = addr;
        }
        Some(token)
    }

    /// 删除会话并清掉指向它的端点索引
    pub fn remove(&mut self, token: &str) -> Option<Session> {
        let session = self.sessions.remove(token)?;
        self.endpoints.retain(|_, bound| bound.as_str() != token);
        Some(session)
    }

    /// 会话数量
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// 遍历全部会话
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn test_login_assigns_ids_and_tokens() {
        let mut registry = SessionRegistry::new();
        let now = Instant::now();

        let (id1, token1) = registry.login("alice".to_string(), addr(1000), now);
        let (id2, token2) = registry.login("bob".to_string(), addr(1001), now);

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_ne!(token1, token2);
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.token_for_endpoint(&addr(1000)), Some(token1.as_str()));
    }

    #[test]
    fn test_validate_nick() {
        assert!(SessionRegistry::validate_nick("alice").is_ok());
        assert_eq!(SessionRegistry::validate_nick(""), Err("Missing nick"));
        assert_eq!(
            SessionRegistry::validate_nick("a;b"),
            Err("Invalid chars in nick")
        );
        assert_eq!(
            SessionRegistry::validate_nick("a=b"),
            Err("Invalid chars in nick")
        );
        assert_eq!(
            SessionRegistry::validate_nick(&"x".repeat(65)),
            Err("Nick too long")
        );
        assert!(SessionRegistry::validate_nick(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_bind_endpoint_replaces_stale_binding() {
        let mut registry = SessionRegistry::new();
        let now = Instant::now();
        let (_, token) = registry.login("alice".to_string(), addr(1000), now);

        // 换端点重绑后旧端点失效
        registry.bind_endpoint(addr(2000), &token);
        assert_eq!(registry.token_for_endpoint(&addr(1000)), None);
        assert_eq!(registry.token_for_endpoint(&addr(2000)), Some(token.as_str()));
    }

    #[test]
    fn test_touch_refreshes_last_seen() {
        let mut registry = SessionRegistry::new();
        let t0 = Instant::now();
        let (_, token) = registry.login("alice".to_string(), addr(1000), t0);

        let t1 = t0 + Duration::from_secs(5);
        assert_eq!(registry.touch(addr(1000), t1), Some(token.clone()));
        assert_eq!(registry.get(&token).unwrap().last_seen, t1);

        // 未绑定端点不刷新
        assert_eq!(registry.touch(addr(9999), t1), None);
    }

    #[test]
    fn test_remove_purges_endpoint_index() {
        let mut registry = SessionRegistry::new();
        let now = Instant::now();
        let (_, token) = registry.login("alice".to_string(), addr(1000), now);

        assert!(registry.remove(&token).is_some());
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.token_for_endpoint(&addr(1000)), None);
        assert!(registry.remove(&token).is_none());
    }

    #[test]
    fn test_invalid_meter_three_strikes() {
        let mut registry = SessionRegistry::new();
        let t0 = Instant::now();
        let (_, token) = registry.login("alice".to_string(), addr(1000), t0);
        let session = registry.get_mut(&token).unwrap();

        assert!(!session.register_invalid(t0));
        assert!(!session.register_invalid(t0 + Duration::from_secs(1)));
        assert!(session.register_invalid(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_invalid_meter_window_resets() {
        let mut registry = SessionRegistry::new();
        let t0 = Instant::now();
        let (_, token) = registry.login("alice".to_string(), addr(1000), t0);
        let session = registry.get_mut(&token).unwrap();

        assert!(!session.register_invalid(t0));
        assert!(!session.register_invalid(t0 + Duration::from_secs(1)));

        // 超过 30 秒窗口后重新计数
        let t1 = t0 + Duration::from_secs(32);
        assert!(!session.register_invalid(t1));
        assert_eq!(session.invalid_count(), 1);
        assert!(!session.register_invalid(t1 + Duration::from_secs(1)));
        assert!(session.register_invalid(t1 + Duration::from_secs(2)));
    }
}
