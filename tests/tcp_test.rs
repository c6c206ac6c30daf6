//! tcp table against an in-process mock server
//!
//! Run with: cargo test --test tcp_test

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use ob_dict::config::TcpSettings;
use ob_dict::{DictConfig, DictError, DictFlags, ErrorKind, OpenMode, Owner, Registry};

/// Serve `reply(request_line)` for every request line on every connection.
fn mock_server<F>(reply: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let mut writer = stream.try_clone().unwrap();
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                if writer.write_all(reply(&line).as_bytes()).is_err() {
                    break;
                }
            }
        }
    });
    (addr, requests)
}

fn registry(max_tries: u32, max_reply_bytes: usize) -> Registry {
    Registry::with_config(DictConfig {
        tcp: TcpSettings {
            timeout_secs: 5,
            max_tries,
            retry_delay_ms: 10,
            max_reply_bytes,
        },
        ..DictConfig::default()
    })
}

#[test]
fn test_found_and_not_found() {
    let (addr, requests) = mock_server(|line| match line {
        "get hi%20there" => "200 %68%69\n".to_string(),
        _ => "500 no such key\n".to_string(),
    });
    let registry = registry(3, 4096);
    let table = registry
        .open(&format!("tcp:{addr}"), OpenMode::ReadOnly, DictFlags::empty())
        .unwrap();

    assert_eq!(table.lookup("hi there").unwrap().as_deref(), Some("hi"));
    assert_eq!(table.last_error(), ErrorKind::None);

    assert_eq!(table.lookup("unknown").unwrap(), None);
    assert_eq!(table.last_error(), ErrorKind::None);

    assert_eq!(requests.load(Ordering::SeqCst), 2);
    assert_eq!(table.owner(), Owner::Unknown);
    assert!(table.flags().contains(DictFlags::PATTERN));
}

#[test]
fn test_non_utf8_value_is_answered_once() {
    let (addr, requests) = mock_server(|_| "200 caf%E9\n".to_string());
    let registry = registry(3, 4096);
    let table = registry
        .open(&format!("tcp:{addr}"), OpenMode::ReadOnly, DictFlags::empty())
        .unwrap();

    assert_eq!(table.lookup("k").unwrap().as_deref(), Some("caf\u{FFFD}"));
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transient_error_is_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    let (addr, _) = mock_server(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            "421 busy\n".to_string()
        } else {
            "200 ok\n".to_string()
        }
    });
    let registry = registry(3, 4096);
    let table = registry
        .open(&format!("tcp:{addr}"), OpenMode::ReadOnly, DictFlags::empty())
        .unwrap();

    assert_eq!(table.lookup("k").unwrap().as_deref(), Some("ok"));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_gives_up_after_max_tries() {
    let (addr, requests) = mock_server(|_| "400 try again later\n".to_string());
    let registry = registry(3, 4096);
    let table = registry
        .open(&format!("tcp:{addr}"), OpenMode::ReadOnly, DictFlags::empty())
        .unwrap();

    let err = table.lookup("k").unwrap_err();
    assert!(matches!(err, DictError::Retry { .. }), "{err}");
    assert_eq!(table.last_error(), ErrorKind::Retry);
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[test]
fn test_protocol_violations_are_retried() {
    let (addr, requests) = mock_server(|line| match line {
        "get long" => format!("200 {}\n", "x".repeat(100)),
        _ => "hello\n".to_string(),
    });
    let registry = registry(2, 32);
    let table = registry
        .open(&format!("tcp:{addr}"), OpenMode::ReadOnly, DictFlags::empty())
        .unwrap();

    assert!(matches!(table.lookup("long"), Err(DictError::Retry { .. })));
    assert!(matches!(table.lookup("garbage"), Err(DictError::Retry { .. })));
    assert_eq!(requests.load(Ordering::SeqCst), 4);
}

#[test]
fn test_connection_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let registry = registry(2, 4096);
    let table = registry
        .open(&format!("tcp:{addr}"), OpenMode::ReadOnly, DictFlags::empty())
        .unwrap();

    let err = table.lookup("k").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Retry);
}

#[test]
fn test_refuses_unsafe_opens() {
    let registry = registry(1, 4096);

    let no_unauth = registry
        .open("tcp:127.0.0.1:1", OpenMode::ReadOnly, DictFlags::NO_UNAUTH)
        .unwrap();
    assert!(matches!(
        no_unauth.lookup("k"),
        Err(DictError::Unavailable { .. })
    ));
    assert_eq!(no_unauth.last_error(), ErrorKind::Config);

    let writable = registry
        .open("tcp:127.0.0.1:2", OpenMode::ReadWrite, DictFlags::empty())
        .unwrap();
    assert!(matches!(
        writable.lookup("k"),
        Err(DictError::Unavailable { .. })
    ));
}
