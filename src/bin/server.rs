use microtp::{open, AddrFamily, Role, State};

fn main() {
    env_logger::init();

    let mut conn = open(AddrFamily::V4).expect("failed to open connection");
    conn.listen("0.0.0.0:9090".parse().unwrap()).expect("failed to bind");

    println!(">>> Waiting for incoming connection...");
    let peer = conn.accept().expect("handshake failed");
    println!(">>> Connection accepted from {peer}");

    let mut received = Vec::new();
    loop {
        let mut buf = [0u8; 1500];
        let n = conn.recv(&mut buf).expect("recv failed");
        if conn.state() == State::ClosingByPeer {
            break;
        }
        if n == 0 {
            continue;
        }
        received.extend_from_slice(&buf[..n]);
    }

    println!(">>> Received {} bytes: {:?}", received.len(), String::from_utf8_lossy(&received));

    conn.shutdown(Role::Responder).expect("teardown failed");
    println!(">>> Closed");
}
