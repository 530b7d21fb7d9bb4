//! Request/reply end to end

mod common;

use bytes::Bytes;
use codec::StatusMessage;
use common::{connect_address, status, LOOPBACK};
use messaging::{Client, ClientOptions, Context, MessagingError, Server, TransportSettings};
use network::{Address, ReqSocket};
use std::time::{Duration, Instant};
use types::{Status, StatusLevel};

/// Reply with the request's text upper-cased and the level raised to Error
fn answer(request: &StatusMessage) -> StatusMessage {
    let reply = request.clone();
    reply.modify(|s| {
        s.text = s.text.to_uppercase();
        s.level = StatusLevel::Error;
    });
    reply
}

#[tokio::test]
async fn reply_bytes_match_on_both_sides() {
    let ctx = Context::new();
    let mut server = Server::<Status>::bind(&ctx, LOOPBACK).await.unwrap();
    let mut client = Client::<Status>::connect(&ctx, &connect_address(server.address()))
        .await
        .unwrap();

    let served = tokio::spawn(async move {
        let request = server.next_request().await.unwrap().clone();
        let reply = answer(&request);
        let sent_bytes = reply.encode().unwrap();
        server.reply(&reply).await.unwrap();
        (request, sent_bytes)
    });

    let request = status(11, "disk nearly full");
    let reply = client.request(&request).await.unwrap();
    let (seen_request, sent_bytes) = served.await.unwrap();

    assert_eq!(seen_request, request);
    assert_eq!(reply.encode().unwrap(), sent_bytes);
    assert_eq!(reply.with(|s| s.text.clone()), "DISK NEARLY FULL");
}

#[tokio::test]
async fn polling_server_answers_sequential_requests() {
    let ctx = Context::new();
    let mut server = Server::<Status>::bind(&ctx, LOOPBACK).await.unwrap();
    let mut client = Client::<Status>::connect(&ctx, &connect_address(server.address()))
        .await
        .unwrap();

    let served = tokio::spawn(async move {
        let mut answered = 0;
        while answered < 3 {
            if server.received_request().await.unwrap() {
                let reply = answer(server.request().unwrap());
                server.reply(&reply).await.unwrap();
                answered += 1;
            }
        }
        server
    });

    for code in 0..3 {
        let reply = client.request(&status(code, "ping")).await.unwrap();
        assert_eq!(reply.with(|s| s.code), code);
    }
    served.await.unwrap();
}

#[tokio::test]
async fn second_reply_is_rejected() {
    let ctx = Context::new();
    let mut server = Server::<Status>::bind(&ctx, LOOPBACK).await.unwrap();
    let mut client = Client::<Status>::connect(&ctx, &connect_address(server.address()))
        .await
        .unwrap();

    let served = tokio::spawn(async move {
        let reply = answer(server.next_request().await.unwrap());
        server.reply(&reply).await.unwrap();
        server.reply(&reply).await
    });

    client.request(&status(1, "once")).await.unwrap();
    let second = served.await.unwrap();
    assert!(matches!(second, Err(MessagingError::NoPendingRequest)));
}

#[tokio::test]
async fn client_times_out_against_silent_address() {
    let port = {
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        reserved.local_addr().unwrap().port()
    };
    let ctx = Context::new();
    let mut client = Client::<Status>::connect(&ctx, &format!("tcp://127.0.0.1:{port}"))
        .await
        .unwrap();
    assert_eq!(client.options(), ClientOptions::default());

    let started = Instant::now();
    let result = client.request(&status(1, "anyone?")).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(MessagingError::RequestTimeout { timeout_ms: 4000 })));
    assert!(elapsed >= Duration::from_millis(3900), "gave up early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(6000), "waited too long: {elapsed:?}");
}

#[tokio::test]
async fn late_reply_is_not_delivered_to_next_request() {
    let ctx = Context::new();
    let mut server = Server::<Status>::bind(&ctx, LOOPBACK).await.unwrap();
    let options = ClientOptions {
        send_timeout: Duration::from_millis(600),
        receive_timeout: Duration::from_millis(100),
    };
    let mut client = Client::<Status>::connect_with(&ctx, &connect_address(server.address()), options)
        .await
        .unwrap();

    let served = tokio::spawn(async move {
        // Answer the first request only after the client gave up on it
        let first = answer(server.next_request().await.unwrap());
        tokio::time::sleep(Duration::from_millis(300)).await;
        server.reply(&first).await.unwrap();

        let second = answer(server.next_request().await.unwrap());
        server.reply(&second).await.unwrap();
    });

    let first = client.request(&status(1, "slow")).await;
    assert!(first.unwrap_err().is_timeout());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let second = client.request(&status(2, "fast")).await.unwrap();
    assert_eq!(second.with(|s| s.code), 2);
    served.await.unwrap();
}

#[tokio::test]
async fn malformed_request_is_reported_and_discarded() {
    let ctx = Context::new();
    let mut server = Server::<Status>::bind(&ctx, LOOPBACK).await.unwrap();
    let address: Address = connect_address(server.address()).parse().unwrap();

    let mut raw = ReqSocket::connect(&ctx, &address).await.unwrap();
    raw.send(Bytes::from_static(b"\x09garbage"), Duration::from_millis(600))
        .await
        .unwrap();

    let err = server.next_request().await.unwrap_err();
    assert!(err.is_malformed());
    assert!(server.request().is_none());

    // The server keeps serving well-formed requests
    let mut client = Client::<Status>::connect(&ctx, &address.to_string()).await.unwrap();
    let served = tokio::spawn(async move {
        let reply = answer(server.next_request().await.unwrap());
        server.reply(&reply).await.unwrap();
    });
    let reply = client.request(&status(4, "after garbage")).await.unwrap();
    assert_eq!(reply.with(|s| s.code), 4);
    served.await.unwrap();
}

#[tokio::test]
async fn oversized_request_fails_without_waiting_for_a_reply() {
    let settings = TransportSettings {
        max_message_size: 256,
        ..TransportSettings::default()
    };
    let ctx = Context::with_settings(settings);
    let mut server = Server::<Status>::bind(&ctx, LOOPBACK).await.unwrap();
    let mut client = Client::<Status>::connect(&ctx, &connect_address(server.address()))
        .await
        .unwrap();

    let started = Instant::now();
    let result = client.request(&status(1, &"x".repeat(1024))).await;
    assert!(matches!(result, Err(MessagingError::TransportSendFailure(_))));
    assert!(started.elapsed() < Duration::from_millis(500));

    // The client and its connection stay usable
    let served = tokio::spawn(async move {
        let reply = answer(server.next_request().await.unwrap());
        server.reply(&reply).await.unwrap();
    });
    let reply = client.request(&status(2, "small")).await.unwrap();
    assert_eq!(reply.with(|s| s.text.clone()), "SMALL");
    served.await.unwrap();
}
