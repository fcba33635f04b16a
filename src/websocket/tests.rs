    use crate::server::config::{AppConfig, DEVELOPMENT_ORIGIN};
    use crate::server::init::build_router;
    use crate::server::state::AppState;
    use crate::server::test_support::{test_config, test_state, test_state_with, GOOD_TOKEN};
    use crate::websocket::connection::WsConnection;
    use futures_util::{SinkExt, StreamExt};
    use pixels_core::{CanvasStore, Connection, HubConfig, PixelUpdate};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
    use tokio_util::sync::CancellationToken;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(config: &AppConfig, hub: HubConfig) -> (SocketAddr, Arc<AppState>, CancellationToken) {
        let (state, cancel) = test_state_with(config, hub);
        let app = build_router(config, state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        (addr, state, cancel)
    }

    async fn connect(addr: SocketAddr, origin: &str, token: &str) -> Result<Client, WsError> {
        let mut request = format!("ws://{}/ws", addr).into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("origin", HeaderValue::from_str(origin).unwrap());
        headers.insert("sec-websocket-protocol", HeaderValue::from_str(token).unwrap());
        tokio_tungstenite::connect_async(request)
            .await
            .map(|(client, _)| client)
    }

    async fn next_text(client: &mut Client) -> String {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for frame");
            match frame {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => panic!("Unexpected frame: {:?}", other),
            }
        }
    }

    async fn send_update(client: &mut Client, index: i64, color: &str) {
        let text = format!(
            r#"{{"type":"update","data":{{"index":{},"color":"{}"}}}}"#,
            index, color
        );
        client.send(Message::Text(text)).await.unwrap();
    }

    fn json(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    /// Wait until the server ends the stream
    async fn wait_closed(client: &mut Client, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .is_ok()
    }

    fn timed_config(idle_secs: u64, max_session_secs: u64, ping_secs: u64) -> AppConfig {
        let mut config = test_config();
        config.connection.idle_timeout_secs = idle_secs;
        config.connection.max_session_secs = max_session_secs;
        config.connection.ping_interval_secs = ping_secs;
        config
    }

    #[tokio::test]
    async fn test_initial_snapshot_then_update() {
        let (addr, state, _cancel) = serve(&test_config(), HubConfig::default()).await;
        let mut client = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();

        assert_eq!(
            json(&next_text(&mut client).await),
            serde_json::json!({"type": "initial", "data": "0000000000000000", "clientCount": 1})
        );

        send_update(&mut client, 3, "5").await;
        assert_eq!(
            json(&next_text(&mut client).await),
            serde_json::json!({"type": "update", "data": {"index": 3, "color": "5"}, "clientCount": 1})
        );
        assert_eq!(state.store.get().await.unwrap()[3], b'5');
    }

    #[tokio::test]
    async fn test_updates_reach_other_clients() {
        let (addr, _state, _cancel) = serve(&test_config(), HubConfig::default()).await;
        let mut a = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        next_text(&mut a).await;
        let mut b = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        assert_eq!(json(&next_text(&mut b).await)["clientCount"], 2);

        send_update(&mut a, 1, "1").await;
        send_update(&mut a, 2, "2").await;

        for client in [&mut a, &mut b] {
            let first = json(&next_text(client).await);
            let second = json(&next_text(client).await);
            assert_eq!(first["data"]["index"], 1);
            assert_eq!(second["data"]["index"], 2);
            assert_eq!(second["clientCount"], 2);
        }
    }

    #[tokio::test]
    async fn test_invalid_frames_get_notices() {
        let (addr, _state, _cancel) = serve(&test_config(), HubConfig::default()).await;
        let mut client = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        next_text(&mut client).await;

        client.send(Message::Text("paint it".into())).await.unwrap();
        assert_eq!(next_text(&mut client).await, "Invalid input type");

        send_update(&mut client, 16, "1").await;
        assert_eq!(next_text(&mut client).await, "Error: invalid index: 16");

        send_update(&mut client, 0, "x").await;
        assert_eq!(next_text(&mut client).await, "Error: invalid color value: x");
    }

    #[tokio::test]
    async fn test_client_limit_notice() {
        let hub = HubConfig {
            max_connections_per_address: 1,
            ..HubConfig::default()
        };
        let (addr, _state, _cancel) = serve(&test_config(), hub).await;

        let mut first = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        next_text(&mut first).await;

        let mut second = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        assert_eq!(next_text(&mut second).await, "client limit exceeded");
    }

    #[tokio::test]
    async fn test_wrong_origin_forbidden() {
        let (addr, _state, _cancel) = serve(&test_config(), HubConfig::default()).await;

        match connect(addr, "https://evil.example", GOOD_TOKEN).await {
            Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::FORBIDDEN),
            other => panic!("Expected HTTP rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_bad_captcha_unauthorized() {
        let (addr, _state, _cancel) = serve(&test_config(), HubConfig::default()).await;

        match connect(addr, DEVELOPMENT_ORIGIN, "forged").await {
            Err(WsError::Http(response)) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED)
            }
            other => panic!("Expected HTTP rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_hub_shutdown_closes_sockets() {
        let (addr, state, cancel) = serve(&test_config(), HubConfig::default()).await;
        let mut client = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        next_text(&mut client).await;

        cancel.cancel();

        assert!(wait_closed(&mut client, Duration::from_secs(5)).await);
        assert!(state.hub.count().await.is_err());
    }

    #[tokio::test]
    async fn test_idle_connection_is_dropped() {
        let (addr, state, _cancel) = serve(&timed_config(1, 3600, 30), HubConfig::default()).await;
        let mut client = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        next_text(&mut client).await;
        assert_eq!(state.hub.count().await.unwrap(), 1);

        assert!(wait_closed(&mut client, Duration::from_secs(5)).await);
        assert_eq!(state.hub.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_session_length_is_capped() {
        let (addr, state, _cancel) = serve(&timed_config(30, 1, 30), HubConfig::default()).await;
        let mut client = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        next_text(&mut client).await;

        // Activity does not extend the session
        send_update(&mut client, 0, "1").await;
        next_text(&mut client).await;

        assert!(wait_closed(&mut client, Duration::from_secs(5)).await);
        assert_eq!(state.hub.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pings_keep_responsive_peer_alive() {
        let (addr, state, _cancel) = serve(&timed_config(2, 3600, 1), HubConfig::default()).await;
        let mut client = connect(addr, DEVELOPMENT_ORIGIN, GOOD_TOKEN).await.unwrap();
        next_text(&mut client).await;

        // Reading lets the client answer each ping with a pong
        let deadline = tokio::time::Instant::now() + Duration::from_millis(3500);
        let mut pings = 0;
        while let Ok(frame) = tokio::time::timeout_at(deadline, client.next()).await {
            match frame {
                Some(Ok(Message::Ping(_))) => pings += 1,
                other => panic!("Unexpected frame: {:?}", other),
            }
        }

        assert!(pings >= 2);
        assert_eq!(state.hub.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_eviction_closes_connection() {
        let (state, _cancel) = test_state();
        let addr = IpAddr::V4(Ipv4Addr::new(10, 9, 0, 1));
        let (painter, _painter_rx) = WsConnection::new(addr, 8);
        let (slow, _slow_rx) = WsConnection::new(addr, 1);
        state.hub.register(painter.clone()).await.unwrap();
        state.hub.register(slow.clone()).await.unwrap();

        state.hub.broadcast(painter.id(), PixelUpdate::new(1, '1')).unwrap();
        state.hub.broadcast(painter.id(), PixelUpdate::new(2, '2')).unwrap();
        assert_eq!(state.hub.count().await.unwrap(), 1);

        let signalled = tokio::time::timeout(Duration::from_secs(1), slow.closed()).await;
        assert!(signalled.is_ok());
        assert!(!painter.is_closed());
    }
