//! Fan-out against real sockets: a scripted HTTP server on loopback and UDP
//! receivers decoding with rosc.

use rtbeat_control::{BodyEncoding, DispatchTarget, Dispatcher, SinkOptions, TransformMode};
use std::io::{Read, Write};
use std::net::{TcpListener, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

/// Headers received and the body is as long as `content-length` says
fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw).to_ascii_lowercase();
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= header_end + 4 + content_length
}

/// Answers one connection per status, closing after each response.
/// Returns the base URL and a handle yielding the raw requests.
fn scripted_server(statuses: &'static [&'static str]) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for status in statuses {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            let mut buf = vec![0u8; 4096];
            let mut raw = Vec::new();
            while !request_complete(&raw) {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status
            );
            stream.write_all(response.as_bytes()).unwrap();
            requests.push(String::from_utf8_lossy(&raw).to_ascii_lowercase());
        }
        requests
    });
    (base, handle)
}

fn udp_receiver() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

fn receive_float(socket: &UdpSocket) -> (String, f32) {
    let mut buf = [0u8; rosc::decoder::MTU];
    let (n, _) = socket.recv_from(&mut buf).unwrap();
    match rosc::decoder::decode_udp(&buf[..n]).unwrap().1 {
        rosc::OscPacket::Message(msg) => match msg.args.as_slice() {
            [rosc::OscType::Float(value)] => (msg.addr, *value),
            other => panic!("unexpected args {:?}", other),
        },
        other => panic!("expected message, got {:?}", other),
    }
}

#[test]
fn test_unauthorized_then_accepted_is_retried_once() {
    let (base, server) = scripted_server(&["401 Unauthorized", "204 No Content"]);
    let targets = vec![DispatchTarget::http(base, "abc123")];
    let dispatcher = Dispatcher::from_targets(&targets, &SinkOptions::default()).unwrap();

    let report = dispatcher.dispatch(128);
    assert_eq!(report.sent, 1);

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert!(request.starts_with("post /api/beat-generator/real-time"));
        assert!(request.contains("x-api-key: abc123"));
        assert!(request.contains("bpm=128"));
    }
}

#[test]
fn test_unauthorized_twice_fails() {
    let (base, server) = scripted_server(&["401 Unauthorized", "401 Unauthorized"]);
    let targets = vec![DispatchTarget::http(base, "wrong")];
    let dispatcher = Dispatcher::from_targets(&targets, &SinkOptions::default()).unwrap();

    let report = dispatcher.dispatch(128);
    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 0);
    assert_eq!(server.join().unwrap().len(), 2);
}

#[test]
fn test_json_body() {
    let (base, server) = scripted_server(&["204 No Content"]);
    let targets = vec![DispatchTarget::http(base, "abc123")];
    let options = SinkOptions {
        body_encoding: BodyEncoding::Json,
        ..SinkOptions::default()
    };
    let dispatcher = Dispatcher::from_targets(&targets, &options).unwrap();

    assert!(dispatcher.dispatch(128).all_ok());

    let requests = server.join().unwrap();
    assert!(requests[0].contains("content-type: application/json"));
    assert!(requests[0].contains("{\"bpm\":128}"));
}

#[test]
fn test_unreachable_http_does_not_block_osc() {
    // Bind and drop to get a port nobody listens on
    let closed_port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let (gma3_rx, gma3_port) = udp_receiver();
    let (plain_rx, plain_port) = udp_receiver();

    let targets = vec![
        DispatchTarget::message("127.0.0.1", gma3_port, "/gma3/Page1/Fader201", TransformMode::Gma3),
        DispatchTarget::http(format!("http://127.0.0.1:{}", closed_port), "abc123"),
        DispatchTarget::message("127.0.0.1", plain_port, "/bpm", TransformMode::Plain),
    ];
    let options = SinkOptions {
        http_timeout: Duration::from_millis(500),
        ..SinkOptions::default()
    };
    let dispatcher = Dispatcher::from_targets(&targets, &options).unwrap();

    let report = dispatcher.dispatch(60);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);

    let (addr, value) = receive_float(&gma3_rx);
    assert_eq!(addr, "/gma3/Page1/Fader201");
    assert!((value - 50.0).abs() < 1e-4);

    assert_eq!(receive_float(&plain_rx), ("/bpm".to_string(), 60.0));
}

#[test]
fn test_silent_server_is_bounded_by_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let server = thread::spawn(move || {
        // Accept and hold the connection without ever answering
        let (stream, _) = listener.accept().unwrap();
        let _ = release_rx.recv_timeout(Duration::from_secs(10));
        drop(stream);
    });

    let targets = vec![DispatchTarget::http(base, "abc123")];
    let options = SinkOptions {
        http_timeout: Duration::from_millis(300),
        ..SinkOptions::default()
    };
    let dispatcher = Dispatcher::from_targets(&targets, &options).unwrap();

    let start = Instant::now();
    let report = dispatcher.dispatch(128);
    let elapsed = start.elapsed();

    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 0);
    assert!(
        elapsed < Duration::from_secs(3),
        "dispatch blocked for {:?}",
        elapsed
    );

    release_tx.send(()).unwrap();
    server.join().unwrap();
}
