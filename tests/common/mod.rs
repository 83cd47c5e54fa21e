#![allow(dead_code)]

use gameobj::{ConnectionConfig, InitOptions, ObjectStore, SchemaRegistry, StoreOptions};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use std::time::Duration;

pub const GAME_MODEL: &str = r#"{
    "Character": {
        "Name": "String KEY",
        "Level": "Integer",
        "Hp": "Integer",
        "Mp": "Integer"
    },
    "Item": {
        "Id": "Integer64 KEY",
        "Label": "String",
        "Weight": "Float",
        "Tradable": "Boolean",
        "Icon": "Blob"
    }
}"#;

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::from_model_json(GAME_MODEL).unwrap()
}

/// Store over a named in-memory database. Use a distinct name per test.
pub fn memory_store(name: &str) -> ObjectStore {
    memory_store_with(name, StoreOptions::default())
}

pub fn memory_store_with(name: &str, options: StoreOptions) -> ObjectStore {
    let store = ObjectStore::new(registry()).with_options(options);
    store
        .initialize(
            InitOptions::new("test")
                .credentials("game", "")
                .database(&format!("memory:{}", name)),
        )
        .unwrap();
    store
}

pub fn file_config(path: &Path) -> ConnectionConfig {
    ConnectionConfig::new("game", "")
        .database(path.to_str().unwrap())
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(10))
        .statement_timeout(Duration::from_secs(10))
}

pub fn file_store(path: &Path, options: StoreOptions) -> ObjectStore {
    let store = ObjectStore::new(registry()).with_options(options);
    store.initialize_with_config(file_config(path)).unwrap();
    store
}

/// Minimal HTTP key-value server answering `GET /v1/kv/<key>?raw`.
///
/// Known keys answer 200 with their bytes, unknown keys `missing_status`.
/// Returns the `host:port` it listens on.
pub fn spawn_kv_server(entries: HashMap<String, Vec<u8>>, missing_status: u16) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let Ok(read_half) = stream.try_clone() else { continue };
            let mut reader = BufReader::new(read_half);

            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut header = String::new();
                match reader.read_line(&mut header) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if header == "\r\n" => break,
                    Ok(_) => {}
                }
            }

            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let key = path
                .strip_prefix("/v1/kv/")
                .map(|rest| rest.trim_end_matches("?raw"));

            let (status, body) = match key.and_then(|k| entries.get(k)) {
                Some(body) => (200, body.clone()),
                None => (missing_status, Vec::new()),
            };
            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                _ => "Internal Server Error",
            };

            let head = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                reason,
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        }
    });

    addr
}

/// An address nothing listens on.
pub fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}
