//! 服务端配置
//!
//! 命令行参数手工解析，出错直接返回给入口打印。

use protocol::{
    DEFAULT_MAX_PLAYERS, DEFAULT_MAX_ROOMS, DEFAULT_PORT, DEFAULT_RECONNECT_WINDOW_MS,
    DEFAULT_TIMEOUT_GRACE, DEFAULT_TIMEOUT_MS, DEFAULT_TURN_TIMEOUT_MS, PAUSE_THRESHOLD_CAP_MS,
};

/// 服务端配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_players: usize,
    pub max_rooms: usize,
    /// 心跳超时基数（毫秒）
    pub timeout_ms: u64,
    /// 心跳宽限倍数
    pub timeout_grace: u32,
    /// 回合超时（毫秒）
    pub turn_timeout_ms: u64,
    /// 断线重连窗口（毫秒）
    pub reconnect_window_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_players: DEFAULT_MAX_PLAYERS,
            max_rooms: DEFAULT_MAX_ROOMS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            timeout_grace: DEFAULT_TIMEOUT_GRACE,
            turn_timeout_ms: DEFAULT_TURN_TIMEOUT_MS,
            reconnect_window_ms: DEFAULT_RECONNECT_WINDOW_MS,
        }
    }
}

impl ServerConfig {
    /// 实际心跳超时 = timeout_ms × timeout_grace
    pub fn effective_heartbeat_ms(&self) -> u64 {
        self.timeout_ms * u64::from(self.timeout_grace)
    }

    /// 回合时钟冻结阈值：不超过 12 秒
    pub fn pause_threshold_ms(&self) -> u64 {
        self.effective_heartbeat_ms().min(PAUSE_THRESHOLD_CAP_MS)
    }

    /// 解析命令行参数（不含程序名）
    pub fn from_args<I>(args: I) -> Result<ServerConfig, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = ServerConfig::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" => {
                    config.host = args.next().ok_or("--host requires a value")?;
                }
                "--port" => {
                    let port: u16 = next_number(&mut args, "--port")?;
                    if port == 0 {
                        return Err("Port must be in range 1-65535".to_string());
                    }
                    config.port = port;
                }
                "--players" => {
                    config.max_players = next_positive(&mut args, "--players")? as usize;
                }
                "--rooms" => {
                    config.max_rooms = next_positive(&mut args, "--rooms")? as usize;
                }
                "--timeout-ms" => {
                    config.timeout_ms = next_positive(&mut args, "--timeout-ms")?;
                }
                "--timeout-grace" => {
                    let grace: u64 = next_positive(&mut args, "--timeout-grace")?;
                    config.timeout_grace = u32::try_from(grace)
                        .map_err(|_| "Invalid argument for --timeout-grace".to_string())?;
                }
                "--turn-timeout-ms" => {
                    config.turn_timeout_ms = next_positive(&mut args, "--turn-timeout-ms")?;
                }
                "--reconnect-window-ms" => {
                    config.reconnect_window_ms =
                        next_positive(&mut args, "--reconnect-window-ms")?;
                }
                "--help" | "-h" => return Err(usage()),
                other => return Err(format!("Unknown argument: {other}\n{}", usage())),
            }
        }

        Ok(config)
    }
}

/// 取下一个参数并解析为数字
fn next_number<I, T>(args: &mut I, flag: &str) -> Result<T, String>
where
    I: Iterator<Item = String>,
    T: std::str::FromStr,
{
    args.next()
        .ok_or_else(|| format!("{flag} requires a value"))?
        .parse()
        .map_err(|_| format!("Invalid argument for {flag}"))
}

/// 取下一个参数并解析为正整数
fn next_positive<I>(args: &mut I, flag: &str) -> Result<u64, String>
where
    I: Iterator<Item = String>,
{
    let value: u64 = next_number(args, flag)?;
    if value == 0 {
        return Err(format!("{flag} must be positive"));
    }
    Ok(value)
}

fn usage() -> String {
    [
        "Usage: draughts-server [OPTIONS]",
        "",
        "Options:",
        "  --host <IP>                  Bind address (default: 0.0.0.0)",
        "  --port <PORT>                Listen port (default: 5000)",
        "  --players <N>                Max players (default: 10)",
        "  --rooms <N>                  Max rooms (default: 5)",
        "  --timeout-ms <MS>            Heartbeat timeout base (default: 20000)",
        "  --timeout-grace <N>          Heartbeat grace factor (default: 1)",
        "  --turn-timeout-ms <MS>       Turn timeout (default: 60000)",
        "  --reconnect-window-ms <MS>   Reconnect window (default: 60000)",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ServerConfig, String> {
        ServerConfig::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.turn_timeout_ms, 60000);
        assert_eq!(config.effective_heartbeat_ms(), 20000);
    }

    #[test]
    fn test_parse_flags() {
        let config = parse(&[
            "--host",
            "127.0.0.1",
            "--port",
            "6000",
            "--players",
            "4",
            "--rooms",
            "2",
            "--timeout-ms",
            "5000",
            "--timeout-grace",
            "3",
            "--turn-timeout-ms",
            "30000",
            "--reconnect-window-ms",
            "10000",
        ])
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6000);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.max_rooms, 2);
        assert_eq!(config.effective_heartbeat_ms(), 15000);
        assert_eq!(config.turn_timeout_ms, 30000);
        assert_eq!(config.reconnect_window_ms, 10000);
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse(&["--port", "abc"]).is_err());
        assert!(parse(&["--port", "0"]).is_err());
        assert!(parse(&["--timeout-ms", "0"]).is_err());
        assert!(parse(&["--players"]).is_err());
        assert!(parse(&["--whatever"]).is_err());
    }

    #[test]
    fn test_pause_threshold_capped() {
        // 心跳阈值小时取心跳阈值
        let mut config = ServerConfig::default();
        config.timeout_ms = 5000;
        config.timeout_grace = 1;
        assert_eq!(config.pause_threshold_ms(), 5000);

        // 超过 12 秒则封顶
        config.timeout_ms = 20000;
        config.timeout_grace = 2;
        assert_eq!(config.pause_threshold_ms(), 12000);
    }
}
