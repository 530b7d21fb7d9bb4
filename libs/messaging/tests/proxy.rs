//! Request/reply through the proxy

mod common;

use codec::StatusMessage;
use common::{connect_address, status, LOOPBACK};
use messaging::{Client, Context, Proxy, Server};
use std::collections::HashSet;
use std::time::Duration;
use types::{Status, StatusLevel};

fn answer(request: &StatusMessage, served_by: u32) -> StatusMessage {
    let reply = request.clone();
    reply.modify(|s| {
        s.level = StatusLevel::Ok;
        s.text = format!("{}:{}", s.text, served_by);
    });
    reply
}

/// Serve `count` requests, tagging replies with `id`
fn serve(mut server: Server<Status>, id: u32, count: usize) -> tokio::task::JoinHandle<Server<Status>> {
    tokio::spawn(async move {
        for _ in 0..count {
            let reply = answer(server.next_request().await.unwrap(), id);
            server.reply(&reply).await.unwrap();
        }
        server
    })
}

#[tokio::test]
async fn proxied_round_trip_equals_direct() {
    let ctx = Context::new();
    let request = status(21, "calibrate");

    // Direct
    let server = Server::<Status>::bind(&ctx, LOOPBACK).await.unwrap();
    let mut direct = Client::<Status>::connect(&ctx, &connect_address(server.address()))
        .await
        .unwrap();
    let served = serve(server, 1, 1);
    let direct_reply = direct.request(&request).await.unwrap();
    served.await.unwrap();

    // Through the proxy
    let proxy = Proxy::bind(&ctx, LOOPBACK, LOOPBACK).await.unwrap().spawn();
    let server = Server::<Status>::connect(&ctx, &connect_address(proxy.back_address()))
        .await
        .unwrap();
    let mut proxied = Client::<Status>::connect(&ctx, &connect_address(proxy.front_address()))
        .await
        .unwrap();
    let served = serve(server, 1, 1);
    let proxied_reply = proxied.request(&request).await.unwrap();
    served.await.unwrap();

    assert_eq!(proxied_reply, direct_reply);
    assert_eq!(proxied_reply.encode().unwrap(), direct_reply.encode().unwrap());
    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn requests_spread_over_servers() {
    let ctx = Context::new();
    let proxy = Proxy::bind(&ctx, LOOPBACK, LOOPBACK).await.unwrap().spawn();
    let back = connect_address(proxy.back_address());

    let first = Server::<Status>::connect(&ctx, &back).await.unwrap();
    let second = Server::<Status>::connect(&ctx, &back).await.unwrap();
    // Let both servers reach the proxy before traffic starts
    tokio::time::sleep(Duration::from_millis(200)).await;
    let first = serve(first, 1, 2);
    let second = serve(second, 2, 2);

    let mut client = Client::<Status>::connect(&ctx, &connect_address(proxy.front_address()))
        .await
        .unwrap();
    let mut served_by = HashSet::new();
    for code in 0..4 {
        let reply = client.request(&status(code, "job")).await.unwrap();
        assert_eq!(reply.with(|s| s.code), code);
        served_by.insert(reply.with(|s| s.text.clone()));
    }

    assert_eq!(served_by.len(), 2);
    first.await.unwrap();
    second.await.unwrap();
    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn replies_reach_the_right_client() {
    let ctx = Context::new();
    let proxy = Proxy::bind(&ctx, LOOPBACK, LOOPBACK).await.unwrap().spawn();
    let server = Server::<Status>::connect(&ctx, &connect_address(proxy.back_address()))
        .await
        .unwrap();
    let served = serve(server, 7, 10);

    let front = connect_address(proxy.front_address());
    let mut clients = Vec::new();
    for n in 0..5u32 {
        let mut client = Client::<Status>::connect(&ctx, &front).await.unwrap();
        clients.push(tokio::spawn(async move {
            for round in 0..2u32 {
                let code = n * 10 + round;
                let reply = client.request(&status(code, "mine")).await.unwrap();
                assert_eq!(reply.with(|s| s.code), code);
            }
        }));
    }
    for client in clients {
        client.await.unwrap();
    }
    served.await.unwrap();
    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn server_started_before_proxy_connects_later() {
    let port = {
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        reserved.local_addr().unwrap().port()
    };
    let back = format!("tcp://127.0.0.1:{port}");
    let ctx = Context::new();

    let server = Server::<Status>::connect(&ctx, &back).await.unwrap();
    let served = serve(server, 3, 1);

    let proxy = Proxy::bind(&ctx, LOOPBACK, &back).await.unwrap().spawn();
    let mut client = Client::<Status>::connect(&ctx, &connect_address(proxy.front_address()))
        .await
        .unwrap();

    let reply = client.request(&status(8, "late")).await.unwrap();
    assert_eq!(reply.with(|s| s.text.clone()), "late:3");
    served.await.unwrap();
    proxy.shutdown().await.unwrap();
}

#[tokio::test]
async fn request_waits_for_a_server_to_join() {
    let ctx = Context::new();
    let proxy = Proxy::bind_with(&ctx, LOOPBACK, LOOPBACK, Duration::from_millis(100))
        .await
        .unwrap()
        .spawn();
    let mut client = Client::<Status>::connect(&ctx, &connect_address(proxy.front_address()))
        .await
        .unwrap();
    let pending = tokio::spawn(async move { client.request(&status(5, "queued")).await });

    // Longer than the forward timeout: the request must not be dropped meanwhile
    tokio::time::sleep(Duration::from_millis(400)).await;
    let server = Server::<Status>::connect(&ctx, &connect_address(proxy.back_address()))
        .await
        .unwrap();
    let served = serve(server, 4, 1);

    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply.with(|s| s.text.clone()), "queued:4");
    served.await.unwrap();
    proxy.shutdown().await.unwrap();
}
