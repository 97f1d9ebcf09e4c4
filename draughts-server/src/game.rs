//! 对局控制
//!
//! 包含回合计时器

use std::time::{Duration, Instant};

/// 回合计时器
///
/// 没有系统定时器，deadline 由单调时钟推算、周期扫描触发。
/// 两种状态互斥：
/// - 计时中：`turn_start` 有值且 `remaining_ms` 为 -1；
/// - 冻结：`turn_start` 为空且 `remaining_ms` 保存剩余时间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnClock {
    /// 当前回合开始时间
    turn_start: Option<Instant>,
    /// 冻结时保存的剩余时间（毫秒）；-1 表示未冻结
    remaining_ms: i64,
}

impl TurnClock {
    /// 未开局状态
    pub fn idle() -> Self {
        Self {
            turn_start: None,
            remaining_ms: -1,
        }
    }

    /// 从 now 起重新计满一个回合
    pub fn start(&mut self, now: Instant) {
        self.turn_start = Some(now);
        self.remaining_ms = -1;
    }

    /// 是否在计时中
    pub fn is_running(&self) -> bool {
        self.turn_start.is_some()
    }

    /// 当前剩余时间（毫秒）
    pub fn remaining_ms(&self, now: Instant, turn_timeout_ms: u64) -> i64 {
        if let Some(start) = self.turn_start {
            let elapsed = now.saturating_duration_since(start).as_millis() as i64;
            (turn_timeout_ms as i64 - elapsed).max(0)
        } else if self.remaining_ms >= 0 {
            self.remaining_ms
        } else {
            turn_timeout_ms as i64
        }
    }

    /// 冻结：以 frozen_at 为当前时刻保存剩余时间并停表
    ///
    /// frozen_at 可以早于 now（服务端停摆检测用最后一次收包时间冻结）。
    pub fn freeze(&mut self, frozen_at: Instant, turn_timeout_ms: u64) {
        if let Some(start) = self.turn_start {
            let elapsed = frozen_at.saturating_duration_since(start).as_millis() as i64;
            self.remaining_ms = (turn_timeout_ms as i64 - elapsed).max(0);
        }
        self.turn_start = None;
    }

    /// 解冻：回拨回合起点，使冻结时保存的剩余时间不变
    pub fn resume(&mut self, now: Instant, turn_timeout_ms: u64) {
        if self.turn_start.is_some() {
            return;
        }

        let remaining = if self.remaining_ms >= 0 {
            self.remaining_ms
        } else {
            turn_timeout_ms as i64
        };
        let consumed = (turn_timeout_ms as i64 - remaining).max(0) as u64;
        self.turn_start = Some(
            now.checked_sub(Duration::from_millis(consumed))
                .unwrap_or(now),
        );
        self.remaining_ms = -1;
    }

    /// 回合是否超时；冻结中的时钟不超时
    pub fn expired(&self, now: Instant, turn_timeout_ms: u64) -> bool {
        match self.turn_start {
            Some(start) => {
                now.saturating_duration_since(start).as_millis() > u128::from(turn_timeout_ms)
            }
            None => false,
        }
    }
}

impl Default for TurnClock {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: u64 = 60_000;

    #[test]
    fn test_idle_clock() {
        let clock = TurnClock::idle();
        let now = Instant::now();
        assert!(!clock.is_running());
        assert!(!clock.expired(now, TIMEOUT));
        assert_eq!(clock.remaining_ms(now, TIMEOUT), TIMEOUT as i64);
    }

    #[test]
    fn test_running_remaining() {
        let t0 = Instant::now();
        let mut clock = TurnClock::idle();
        clock.start(t0);

        let t1 = t0 + Duration::from_millis(10_000);
        assert_eq!(clock.remaining_ms(t1, TIMEOUT), 50_000);
        assert!(!clock.expired(t1, TIMEOUT));

        let t2 = t0 + Duration::from_millis(60_001);
        assert_eq!(clock.remaining_ms(t2, TIMEOUT), 0);
        assert!(clock.expired(t2, TIMEOUT));
    }

    #[test]
    fn test_freeze_preserves_remaining() {
        let t0 = Instant::now();
        let mut clock = TurnClock::idle();
        clock.start(t0);

        clock.freeze(t0 + Duration::from_millis(25_000), TIMEOUT);
        assert!(!clock.is_running());

        // 冻结期间剩余时间不随 now 变化，也不会超时
        let later = t0 + Duration::from_millis(300_000);
        assert_eq!(clock.remaining_ms(later, TIMEOUT), 35_000);
        assert!(!clock.expired(later, TIMEOUT));
    }

    #[test]
    fn test_resume_restores_remaining() {
        let t0 = Instant::now();
        let mut clock = TurnClock::idle();
        clock.start(t0);
        clock.freeze(t0 + Duration::from_millis(25_000), TIMEOUT);

        // 冻结 10 分钟后恢复，剩余时间从 35 秒继续走
        let t1 = t0 + Duration::from_millis(625_000);
        clock.resume(t1, TIMEOUT);
        assert!(clock.is_running());
        assert_eq!(clock.remaining_ms(t1, TIMEOUT), 35_000);

        let t2 = t1 + Duration::from_millis(35_001);
        assert!(clock.expired(t2, TIMEOUT));
    }

    #[test]
    fn test_freeze_before_start_is_floor_zero() {
        let t0 = Instant::now();
        let mut clock = TurnClock::idle();
        clock.start(t0 + Duration::from_millis(1000));

        // 冻结时刻早于回合起点：按零耗时处理
        clock.freeze(t0, TIMEOUT);
        assert_eq!(clock.remaining_ms(t0, TIMEOUT), TIMEOUT as i64);
    }

    #[test]
    fn test_resume_running_clock_is_noop() {
        let t0 = Instant::now();
        let mut clock = TurnClock::idle();
        clock.start(t0);
        clock.resume(t0 + Duration::from_millis(5000), TIMEOUT);

        assert_eq!(
            clock.remaining_ms(t0 + Duration::from_millis(10_000), TIMEOUT),
            50_000
        );
    }
}
