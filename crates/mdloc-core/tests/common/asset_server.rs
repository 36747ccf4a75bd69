//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed set of paths with their content types. Answers HEAD with
//! headers only, unknown paths with 404, and counts GETs per path.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone)]
pub struct Asset {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

pub struct AssetServer {
    /// e.g. "http://127.0.0.1:12345/"
    pub base: String,
    gets: Arc<Mutex<HashMap<String, usize>>>,
}

impl AssetServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    /// Number of GET requests received for `path` (leading `/` optional).
    pub fn gets(&self, path: &str) -> usize {
        let key = format!("/{}", path.trim_start_matches('/'));
        self.gets.lock().unwrap().get(&key).copied().unwrap_or(0)
    }
}

/// Starts a server in a background thread. Keys of `assets` are request
/// paths such as "/img/a.png". The server runs until the process exits.
pub fn start(assets: HashMap<String, Asset>) -> AssetServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let assets = Arc::new(assets);
    let gets: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let counter = Arc::clone(&gets);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let assets = Arc::clone(&assets);
            let counter = Arc::clone(&counter);
            thread::spawn(move || handle(stream, &assets, &counter));
        }
    });
    AssetServer {
        base: format!("http://127.0.0.1:{}/", port),
        gets,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    assets: &HashMap<String, Asset>,
    gets: &Mutex<HashMap<String, usize>>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");
    let path = path.split('?').next().unwrap_or(path).to_string();

    let is_head = method.eq_ignore_ascii_case("HEAD");
    if !is_head && !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }
    if !is_head {
        *gets.lock().unwrap().entry(path.clone()).or_insert(0) += 1;
    }

    let Some(asset) = assets.get(&path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        asset.content_type,
        asset.body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    if !is_head {
        let _ = stream.write_all(&asset.body);
    }
}
