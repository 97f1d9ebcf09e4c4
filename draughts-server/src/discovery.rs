//! 发现服务
//!
//! 在独立端口应答局域网广播的 DISCOVER 请求，返回服务器可用地址。
//! 客户端收到 host=0.0.0.0 时会回退用应答包的来源地址。

use anyhow::Result;
use tokio::net::UdpSocket;
use tracing::{info, warn};

use protocol::{ServerMessage, DISCOVERY_PORT};

/// 运行发现应答循环
pub async fn run(advertise_host: String, game_port: u16) -> Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", DISCOVERY_PORT)).await?;
    info!("发现服务监听 0.0.0.0:{DISCOVERY_PORT}");

    let reply = ServerMessage::Endpoint {
        host: advertise_host,
        port: game_port,
    }
    .to_line(0);

    let mut buf = [0u8; 64];
    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("发现服务接收失败: {e}");
                continue;
            }
        };

        let request = String::from_utf8_lossy(&buf[..len]);
        if request.trim() != "DISCOVER" {
            continue;
        }

        if let Err(e) = socket.send_to(reply.as_bytes(), src).await {
            warn!("发现应答发送失败 addr={src}: {e}");
        }
    }
}
