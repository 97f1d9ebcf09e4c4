//! 捷克跳棋 UDP 服务端入口

use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{error, info, warn};

use draughts_server::config::ServerConfig;
use draughts_server::discovery;
use draughts_server::server::{MessageHandler, Outbox, ServerState};
use protocol::{ErrorCode, ServerMessage, MAX_DATAGRAM_LEN, SWEEP_INTERVAL};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let config = match ServerConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    };

    let socket = UdpSocket::bind((config.host.as_str(), config.port)).await?;
    info!("跳棋 UDP 服务器启动，监听 {}:{}", config.host, config.port);

    // 发现服务独立任务应答广播，不碰对局状态
    let advertise_host = config.host.clone();
    let game_port = config.port;
    tokio::spawn(async move {
        if let Err(e) = discovery::run(advertise_host, game_port).await {
            error!("发现服务退出: {e}");
        }
    });

    run(socket, ServerState::new(config)).await
}

/// 事件循环：单写者独占服务器状态
///
/// 接收带 500 毫秒超时；无论收到数据报还是超时唤醒，到期都跑一次
/// 周期扫描，再把本轮积累的应答一次性发出。
async fn run(socket: UdpSocket, mut state: ServerState) -> anyhow::Result<()> {
    let mut buf = [0u8; MAX_DATAGRAM_LEN * 2];

    loop {
        let received = timeout(SWEEP_INTERVAL, socket.recv_from(&mut buf)).await;
        let now = Instant::now();
        let mut out = Outbox::new();

        match received {
            Ok(Ok((len, src))) => match std::str::from_utf8(&buf[..len]) {
                Ok(text) => MessageHandler::handle(&mut state, &mut out, src, text, now),
                Err(_) => {
                    warn!("丢弃非 UTF-8 数据报 src={src}");
                    out.send(
                        src,
                        0,
                        &ServerMessage::Error {
                            code: ErrorCode::InvalidFormat,
                            detail: Some("Message is not valid UTF-8".to_string()),
                        },
                    );
                }
            },
            Ok(Err(e)) => warn!("接收失败: {e}"),
            // 接收超时：落入周期扫描
            Err(_) => {}
        }

        if state.sweep_due(now) {
            MessageHandler::sweep(&mut state, &mut out, now);
        }

        out.flush(&socket).await;
    }
}
