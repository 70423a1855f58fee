//! Integration tests for the relay session lifecycle

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use tlsrelay::relay::{Phase, Session};
use tlsrelay::Dialer;

/// Spawn a TCP echo server that handles any number of connections
async fn spawn_echo_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 16 * 1024];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    addr
}

/// Wire a client through a freshly started session to the given dialer,
/// returning the client stream and handles into the running session
async fn start_session(
    dialer: Arc<Dialer>,
) -> (
    TcpStream,
    Arc<tlsrelay::relay::SessionCounters>,
    Arc<tlsrelay::relay::Terminator>,
    tokio::task::JoinHandle<()>,
) {
    let local_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = local_listener.local_addr().unwrap();

    let client = TcpStream::connect(local_addr).await.unwrap();
    let (accepted, peer_addr) = local_listener.accept().await.unwrap();

    let session = Session::new(1, accepted, peer_addr, dialer);
    let counters = session.counters();
    let terminator = session.terminator();
    let handle = tokio::spawn(session.start());

    (client, counters, terminator, handle)
}

#[tokio::test]
async fn test_small_payload_relayed_byte_for_byte() {
    let echo_addr = spawn_echo_server().await;
    let dialer = Arc::new(Dialer::plain(&echo_addr.to_string()).await.unwrap());

    let (mut client, counters, _terminator, handle) = start_session(dialer).await;

    let payload = b"hello through the relay";
    client.write_all(payload).await.unwrap();

    let mut echoed = vec![0u8; payload.len()];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, payload);

    drop(client);
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    assert_eq!(counters.sent(), payload.len() as u64);
    assert_eq!(counters.received(), payload.len() as u64);
}

#[tokio::test]
async fn test_payload_larger_than_copy_buffer() {
    let echo_addr = spawn_echo_server().await;
    let dialer = Arc::new(Dialer::plain(&echo_addr.to_string()).await.unwrap());

    let (client, counters, _terminator, handle) = start_session(dialer).await;

    // Crosses the 65535-byte copy buffer boundary several times
    let payload: Vec<u8> = (0..200_000usize).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();

    let (mut read_half, mut write_half) = client.into_split();

    let writer = tokio::spawn(async move {
        write_half.write_all(&payload).await.unwrap();
        write_half
    });

    let mut echoed = vec![0u8; expected.len()];
    read_half.read_exact(&mut echoed).await.unwrap();
    assert_eq!(echoed, expected);

    let write_half = writer.await.unwrap();

    // Only close once everything came back, so the session sees all bytes
    drop(read_half);
    drop(write_half);

    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    assert_eq!(counters.sent(), expected.len() as u64);
    assert_eq!(counters.received(), expected.len() as u64);
}

#[tokio::test]
async fn test_remote_close_terminates_session_exactly_once() {
    // Remote accepts, reads a little, then closes
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 16];
        let _ = stream.read(&mut buf).await;
        // Dropping the stream closes the remote side
    });

    let dialer = Arc::new(Dialer::plain(&remote_addr.to_string()).await.unwrap());
    let (mut client, _counters, terminator, handle) = start_session(dialer).await;

    client.write_all(b"trigger").await.unwrap();

    // The session tears down; the local client observes end-of-stream
    let mut buf = [0u8; 16];
    let n = timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);

    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_eq!(terminator.phase(), Phase::Terminated);
}

#[tokio::test]
async fn test_dial_failure_closes_local_with_zero_counters() {
    // Grab a port with no listener behind it
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = unused.local_addr().unwrap();
    drop(unused);

    let dialer = Arc::new(Dialer::plain(&dead_addr.to_string()).await.unwrap());
    let (mut client, counters, terminator, handle) = start_session(dialer).await;

    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    // Local connection was closed without any piping
    let mut buf = [0u8; 8];
    let n = timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
    assert_eq!(counters.sent(), 0);
    assert_eq!(counters.received(), 0);
    // No pipe ever ran, so termination never fired
    assert_eq!(terminator.phase(), Phase::Active);
}

#[tokio::test]
async fn test_tls_unwrap_handshake_failure_tears_down_cleanly() {
    // A remote that speaks no TLS: accept and close immediately
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            drop(stream);
        }
    });

    let dialer = Arc::new(
        Dialer::tls_unwrap(&format!("localhost:{}", remote_addr.port()))
            .await
            .unwrap(),
    );
    assert!(dialer.is_tls());

    let (mut client, counters, _terminator, handle) = start_session(dialer).await;

    timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();

    let mut buf = [0u8; 8];
    let n = timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0);
    assert_eq!(counters.sent(), 0);
    assert_eq!(counters.received(), 0);
}
