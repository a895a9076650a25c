use bincode::{deserialize, serialize};
use shared::{GameMode, Packet, Player};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

/// Scripted smoke client: drives one full session against a running server
/// and prints every snapshot it receives along the way.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let server_addr = "127.0.0.1:8080".parse::<SocketAddr>()?;
    let code = "SMOK".to_string();

    // Subscribe first so every later mutation comes back as a broadcast.
    send(&socket, server_addr, &Packet::Subscribe { code: code.clone() }).await?;
    recv_and_print(&socket, "subscribe ack").await?;

    send(
        &socket,
        server_addr,
        &Packet::Create {
            code: code.clone(),
            mode: GameMode::Standard,
        },
    )
    .await?;
    recv_and_print(&socket, "create reply").await?;
    recv_and_print(&socket, "create broadcast").await?;

    for (id, name) in [("alice", "Alice"), ("bob", "Bob")] {
        send(
            &socket,
            server_addr,
            &Packet::Join {
                code: code.clone(),
                player: Player::new(id.to_string(), name.to_string()),
            },
        )
        .await?;
        recv_and_print(&socket, "join broadcast").await?;
    }

    send(&socket, server_addr, &Packet::Start { code: code.clone() }).await?;
    recv_and_print(&socket, "start broadcast").await?;

    // Stagger the two answers so the score gap is visible in the output.
    send(
        &socket,
        server_addr,
        &Packet::SubmitAnswer {
            code: code.clone(),
            player_id: "alice".to_string(),
            answer_index: 2,
        },
    )
    .await?;
    recv_and_print(&socket, "first answer broadcast").await?;

    sleep(Duration::from_millis(500)).await;
    send(
        &socket,
        server_addr,
        &Packet::SubmitAnswer {
            code: code.clone(),
            player_id: "bob".to_string(),
            answer_index: 0,
        },
    )
    .await?;
    recv_and_print(&socket, "second answer broadcast").await?;

    send(&socket, server_addr, &Packet::Advance { code: code.clone() }).await?;
    recv_and_print(&socket, "advance broadcast").await?;

    send(&socket, server_addr, &Packet::End { code: code.clone() }).await?;
    recv_and_print(&socket, "end broadcast").await?;

    println!("Smoke run complete");
    Ok(())
}

async fn send(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    packet: &Packet,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, server_addr).await?;
    Ok(())
}

async fn recv_and_print(
    socket: &UdpSocket,
    label: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = [0u8; 65_536];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;

    match deserialize::<Packet>(&buf[0..len]) {
        Ok(Packet::Snapshot { code, session }) => match session {
            Some(session) => {
                println!("[{}] {} phase={:?} question={}", label, code, session.phase, session.current_question);
                for player in &session.players {
                    println!(
                        "  {} {} score={} answered={}",
                        player.avatar.as_deref().unwrap_or("?"),
                        player.name,
                        player.score,
                        player.has_answered
                    );
                }
            }
            None => println!("[{}] {}: no such session", label, code),
        },
        Ok(packet) => println!("[{}] {:?}", label, packet),
        Err(e) => println!("[{}] failed to deserialize reply: {}", label, e),
    }
    Ok(())
}
