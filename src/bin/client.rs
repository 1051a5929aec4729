use std::io::{self, Read};

use microtp::{open, AddrFamily, Role};

fn main() {
    env_logger::init();

    let mut conn = open(AddrFamily::V4).expect("failed to open connection");
    println!(">>> Connecting to server...");
    conn.connect("127.0.0.1:9090".parse().unwrap()).expect("handshake failed");
    println!(">>> Connected!");

    let mut input = String::new();
    io::stdin().read_to_string(&mut input).expect("failed to read stdin");

    conn.send(input.as_bytes()).expect("send failed");
    println!(">>> Sent {} bytes", input.len());

    conn.shutdown(Role::Initiator).expect("teardown failed");
    println!(">>> Closed");
}
