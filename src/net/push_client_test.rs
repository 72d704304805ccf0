use super::*;
use crate::net::types::{DishId, DishStatusChange};
use futures_util::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, timeout};
use tokio_tungstenite::WebSocketStream;

const SHORT_DELAY: Duration = Duration::from_millis(100);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("accept timed out")
        .expect("accept failed");
    tokio_tungstenite::accept_async(tcp).await.expect("handshake failed")
}

async fn wait_for_status(rx: &mut watch::Receiver<ConnectionStatus>, want: ConnectionStatus) {
    timeout(Duration::from_secs(5), rx.wait_for(|status| *status == want))
        .await
        .expect("status wait timed out")
        .expect("status channel closed");
}

async fn recv_event(events: &mut EventStream) -> PushEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event receive timed out")
        .expect("event channel closed")
}

fn status_changed(id: i64, is_published: bool) -> String {
    format!(r#"{{"type":"dishStatusChanged","data":{{"dishId":{id},"isPublished":{is_published}}}}}"#)
}

async fn next_socket(accepted: &mut mpsc::UnboundedReceiver<TcpStream>) -> TcpStream {
    timeout(Duration::from_secs(5), accepted.recv())
        .await
        .expect("accept timed out")
        .expect("acceptor stopped")
}

/// Drain a server-side socket until the client goes away.
async fn drain(mut ws: WebSocketStream<TcpStream>) {
    while let Some(Ok(_)) = ws.next().await {}
}

#[tokio::test]
async fn reports_connected_once_socket_opens() {
    let (listener, url) = bind().await;
    let (client, _events) = PushClient::spawn(url, SHORT_DELAY);
    let mut status = client.subscribe_status();

    let _server = accept(&listener).await;
    wait_for_status(&mut status, ConnectionStatus::Connected).await;
    assert!(client.is_connected());

    client.close().await;
}

#[tokio::test]
async fn delivers_events_in_arrival_order_and_skips_malformed() {
    let (listener, url) = bind().await;
    let (client, mut events) = PushClient::spawn(url, SHORT_DELAY);
    let mut server = accept(&listener).await;

    server.send(Message::text(status_changed(1, true))).await.unwrap();
    server.send(Message::text("{not json".to_owned())).await.unwrap();
    server.send(Message::text(r#"{"type":"dishStatusChanged","data":{"dishId":"x"}}"#.to_owned())).await.unwrap();
    server.send(Message::text(status_changed(2, false))).await.unwrap();
    server.send(Message::binary(status_changed(3, true).into_bytes())).await.unwrap();
    server.send(Message::text(r#"{"type":"dishDeleted","data":{"dishId":4}}"#.to_owned())).await.unwrap();

    let expected = [
        PushEvent::DishStatusChanged(DishStatusChange { dish_id: DishId(1), is_published: true }),
        PushEvent::DishStatusChanged(DishStatusChange { dish_id: DishId(2), is_published: false }),
        PushEvent::DishStatusChanged(DishStatusChange { dish_id: DishId(3), is_published: true }),
        PushEvent::Other { kind: "dishDeleted".into() },
    ];
    for want in expected {
        assert_eq!(recv_event(&mut events).await, want);
    }
    assert!(client.is_connected(), "malformed messages must not drop the connection");

    client.close().await;
}

#[tokio::test]
async fn server_close_marks_disconnected_and_reconnects_after_delay() {
    let (listener, url) = bind().await;
    let (client, _events) = PushClient::spawn(url, SHORT_DELAY);
    let mut status = client.subscribe_status();

    let mut first = accept(&listener).await;
    wait_for_status(&mut status, ConnectionStatus::Connected).await;

    let closed_at = Instant::now();
    first.close(None).await.unwrap();
    drop(first);
    wait_for_status(&mut status, ConnectionStatus::Disconnected).await;

    let _second = accept(&listener).await;
    assert!(closed_at.elapsed() >= SHORT_DELAY, "reconnected before the delay elapsed");
    wait_for_status(&mut status, ConnectionStatus::Connected).await;

    client.close().await;
}

#[tokio::test]
async fn never_opens_a_second_socket_while_the_first_is_alive() {
    let (listener, url) = bind().await;
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();
    let acceptor = tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            if accepted_tx.send(tcp).is_err() {
                break;
            }
        }
    });

    let (client, _events) = PushClient::spawn(url, SHORT_DELAY);
    let mut status = client.subscribe_status();
    let quiet = SHORT_DELAY * 5;

    let first = next_socket(&mut accepted).await;
    let first = tokio_tungstenite::accept_async(first).await.expect("handshake failed");
    wait_for_status(&mut status, ConnectionStatus::Connected).await;
    assert!(
        timeout(quiet, accepted.recv()).await.is_err(),
        "second socket opened while the first was still alive"
    );

    drop(first);
    let second = next_socket(&mut accepted).await;
    let _second = tokio_tungstenite::accept_async(second).await.expect("handshake failed");
    wait_for_status(&mut status, ConnectionStatus::Connected).await;
    assert!(
        timeout(quiet, accepted.recv()).await.is_err(),
        "more than one reconnect followed a single close"
    );

    client.close().await;
    acceptor.abort();
}

#[tokio::test]
async fn secure_url_reaches_tcp_connect() {
    let (listener, _) = bind().await;
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = connect_async(format!("wss://{addr}/ws")).await.unwrap_err();
    assert!(
        matches!(err, tokio_tungstenite::tungstenite::Error::Io(_)),
        "expected a connect error, got {err:?}"
    );
}

#[tokio::test]
async fn failed_connect_is_retried_on_the_same_delay() {
    let (listener, url) = bind().await;
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (client, _events) = PushClient::spawn(url, SHORT_DELAY);
    let mut status = client.subscribe_status();
    tokio::time::sleep(SHORT_DELAY / 2).await;
    assert_ne!(client.status(), ConnectionStatus::Connected);

    let listener = TcpListener::bind(addr).await.unwrap();
    let _server = accept(&listener).await;
    wait_for_status(&mut status, ConnectionStatus::Connected).await;

    client.close().await;
}

#[tokio::test]
async fn close_sends_close_frame_and_stops_delivery() {
    let (listener, url) = bind().await;
    let (client, mut events) = PushClient::spawn(url, SHORT_DELAY);
    let mut status = client.subscribe_status();
    let mut server = accept(&listener).await;
    wait_for_status(&mut status, ConnectionStatus::Connected).await;

    timeout(Duration::from_secs(2), client.close()).await.expect("close hung");

    let next = timeout(Duration::from_secs(2), server.next()).await.expect("server read timed out");
    assert!(matches!(next, Some(Ok(Message::Close(_))) | None));
    assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
    assert!(events.recv().await.is_none(), "no events after teardown");
}

#[tokio::test]
async fn close_cancels_pending_reconnect() {
    let (listener, url) = bind().await;
    let (client, _events) = PushClient::spawn(url, Duration::from_millis(300));
    let mut status = client.subscribe_status();

    let mut server = accept(&listener).await;
    wait_for_status(&mut status, ConnectionStatus::Connected).await;
    server.close(None).await.unwrap();
    drain(server).await;
    wait_for_status(&mut status, ConnectionStatus::Disconnected).await;

    timeout(Duration::from_secs(1), client.close()).await.expect("close hung");

    let reconnect = timeout(Duration::from_millis(600), listener.accept()).await;
    assert!(reconnect.is_err(), "client reconnected after close");
}

#[tokio::test]
async fn dropping_the_subscriber_stops_the_client() {
    let (listener, url) = bind().await;
    let (client, events) = PushClient::spawn(url, SHORT_DELAY);
    let mut status = client.subscribe_status();
    let mut server = accept(&listener).await;
    wait_for_status(&mut status, ConnectionStatus::Connected).await;

    drop(events);
    server.send(Message::text(status_changed(1, true))).await.unwrap();
    drain(server).await;
    wait_for_status(&mut status, ConnectionStatus::Disconnected).await;

    let reconnect = timeout(SHORT_DELAY * 4, listener.accept()).await;
    assert!(reconnect.is_err(), "client reconnected without a subscriber");
    client.close().await;
}
