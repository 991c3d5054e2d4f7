//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

use booking_core::booking::types::{NewBooking, RoomType};
use booking_core::booking::{AvailabilityChecker, BookingService};
use booking_core::config::{FallbackCacheConfig, PolicyConfig};
use booking_core::resilience::{FallbackCache, PolicyRegistry, ResilientCaller};
use booking_core::storage::{BookingRepository, InMemoryBookingRepository, InMemoryRoomInventory};

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` receives the request path and returns `(status, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read the request head and body; return the request path.
async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    head.lines().next()?.split_whitespace().nth(1).map(str::to_string)
}

/// A policy with the breaker effectively disabled and one attempt per call.
pub fn single_attempt_policy(name: &str) -> PolicyConfig {
    let mut policy = PolicyConfig::named(name);
    policy.retry_max_attempts = 1;
    policy.minimum_calls = 100;
    policy.sliding_window_size = 100;
    policy
}

pub fn caller_with(policies: &[PolicyConfig]) -> ResilientCaller {
    ResilientCaller::new(
        Arc::new(PolicyRegistry::from_configs(policies)),
        Arc::new(FallbackCache::new(&FallbackCacheConfig::default())),
    )
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

pub fn room_type(total_rooms: u32, room_ids: &[&str]) -> RoomType {
    RoomType {
        id: Uuid::new_v4(),
        hotel_id: Uuid::new_v4(),
        total_rooms,
        room_ids: room_ids.iter().map(|s| s.to_string()).collect(),
        nightly_rate: Decimal::new(15000, 2),
        max_occupancy: 2,
    }
}

pub fn new_booking(room_type: &RoomType, check_in: NaiveDate, check_out: NaiveDate, rooms: u32) -> NewBooking {
    NewBooking {
        user_id: Uuid::new_v4(),
        hotel_id: room_type.hotel_id,
        room_type_id: room_type.id,
        check_in,
        check_out,
        guest_count: rooms,
        rooms,
    }
}

/// Booking service over in-memory stores stocked with `room_types`.
pub fn booking_service_with(
    room_types: &[RoomType],
    repo: Arc<dyn BookingRepository>,
) -> BookingService {
    let inventory = InMemoryRoomInventory::new();
    for rt in room_types {
        inventory.add(rt.clone());
    }
    let checker = AvailabilityChecker::new(Arc::new(inventory), repo.clone());
    BookingService::new(repo, checker)
}

pub fn booking_service(room_types: &[RoomType]) -> BookingService {
    booking_service_with(room_types, Arc::new(InMemoryBookingRepository::new()))
}
