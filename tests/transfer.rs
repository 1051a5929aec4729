//! End-to-end scenarios over real loopback UDP sockets (spec §8 a, b, c, f).

use std::thread;

use microtp::{open, AddrFamily, Connection, Control, Error, Header, Role, State, HEADER_LEN};

fn listening_server() -> Connection {
    let mut server = open(AddrFamily::V4).expect("open failed");
    server.listen("127.0.0.1:0".parse().unwrap()).expect("listen failed");
    server
}

#[test]
fn short_message_round_trips() {
    let mut server = listening_server();
    let server_addr = server.local_addr().unwrap();

    let server_thread = thread::spawn(move || {
        server.accept().expect("server handshake failed");
        let mut buf = [0u8; 1500];
        let n = server.recv(&mut buf).expect("server recv failed");
        (server, buf, n)
    });

    let mut client = open(AddrFamily::V4).expect("open failed");
    client.connect(server_addr).expect("client handshake failed");
    client.send(&[0x36, 0x39, 0x00]).expect("send failed");

    let (_server, buf, n) = server_thread.join().unwrap();
    assert_eq!(n, 3);
    assert_eq!(&buf[..3], &[0x36, 0x39, 0x00]);
}

#[test]
fn multi_fragment_payload_reassembles() {
    let mut server = listening_server();
    let server_addr = server.local_addr().unwrap();

    let server_thread = thread::spawn(move || {
        server.accept().expect("server handshake failed");
        let mut buf = [0u8; 3000];
        let n = server.recv(&mut buf).expect("server recv failed");
        (buf, n)
    });

    let mut client = open(AddrFamily::V4).expect("open failed");
    client.connect(server_addr).expect("client handshake failed");
    let payload = vec![0x7eu8; 2805];
    client.send(&payload).expect("send failed");

    let (buf, n) = server_thread.join().unwrap();
    assert_eq!(n, 2805);
    assert_eq!(&buf[..2805], payload.as_slice());
}

/// A payload longer than the initial congestion window (3·MSS = 4200 B)
/// forces `send` to split it across two bursts. The FRAGMENT flag must stay
/// set across the burst boundary — only the very last chunk of the whole
/// message clears it — or the peer's `recv` returns early at 4200 bytes
/// instead of reassembling the full message (spec §4.3, §8.9).
#[test]
fn payload_spanning_multiple_bursts_reassembles_whole_message() {
    let mut server = listening_server();
    let server_addr = server.local_addr().unwrap();

    let server_thread = thread::spawn(move || {
        server.accept().expect("server handshake failed");
        let mut buf = [0u8; 6000];
        let n = server.recv(&mut buf).expect("server recv failed");
        (buf, n)
    });

    let mut client = open(AddrFamily::V4).expect("open failed");
    client.connect(server_addr).expect("client handshake failed");
    let payload: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
    client.send(&payload).expect("send failed");

    let (buf, n) = server_thread.join().unwrap();
    assert_eq!(n, 5000);
    assert_eq!(&buf[..5000], payload.as_slice());
}

#[test]
fn graceful_close_reaches_closed_on_both_ends() {
    let mut server = listening_server();
    let server_addr = server.local_addr().unwrap();

    let server_thread = thread::spawn(move || {
        server.accept().expect("server handshake failed");
        let mut buf = [0u8; 1500];
        loop {
            let n = server.recv(&mut buf).expect("server recv failed");
            if server.state() == State::ClosingByPeer {
                break;
            }
            assert_eq!(n, 4);
        }
        server.shutdown(Role::Responder).expect("responder teardown failed");
        server.state()
    });

    let mut client = open(AddrFamily::V4).expect("open failed");
    client.connect(server_addr).expect("client handshake failed");
    client.send(b"ping").expect("send failed");
    client.shutdown(Role::Initiator).expect("initiator teardown failed");

    let server_final_state = server_thread.join().unwrap();
    assert_eq!(client.state(), State::Closed);
    assert_eq!(server_final_state, State::Closed);
}

/// Hand-crafted responder that replies to the SYN with a `SYN`-only
/// datagram (no ACK), exercising the active-open failure path (spec §8.c).
#[test]
fn handshake_fails_without_ack_in_synack() {
    let responder = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let responder_addr = responder.local_addr().unwrap();

    let responder_thread = thread::spawn(move || {
        let mut buf = [0u8; HEADER_LEN];
        let (_, peer) = responder.recv_from(&mut buf).unwrap();

        let bad_synack = Header::for_send(0, 0, Control::SYN, 1000, &[]);
        let mut out = [0u8; HEADER_LEN];
        bad_synack.encode(&mut out);
        responder.send_to(&out, peer).unwrap();
    });

    let mut client = open(AddrFamily::V4).expect("open failed");
    let result = client.connect(responder_addr);

    responder_thread.join().unwrap();
    assert!(matches!(result, Err(Error::ConnectionAborted(_))));
    assert_eq!(client.state(), State::Invalid);
}
