//! Multiplexed RPC client over a single gateway WebSocket.
//!
//! One connection carries interleaved responses and server-push events.
//! Requests are correlated by id through a pending table; events fan out to
//! listeners in registration order.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    futures::{
        SinkExt, StreamExt,
        stream::{SplitSink, SplitStream},
    },
    naia_protocol::{EventFrame, GatewayFrame, HelloOk},
    tokio::{
        net::TcpStream,
        sync::{mpsc, oneshot},
    },
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    handshake::{self, ConnectOptions},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callback invoked for every server-push event.
pub type EventHandler = Arc<dyn Fn(&EventFrame) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ── Connection ───────────────────────────────────────────────────────────────

struct PendingRequest {
    method: String,
    sender: oneshot::Sender<Result<serde_json::Value>>,
}

/// State owned by one successful handshake.
struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    pending: Mutex<HashMap<String, PendingRequest>>,
    methods: Vec<String>,
    method_set: HashSet<String>,
    protocol: u32,
    open: AtomicBool,
    closed: CancellationToken,
}

impl Connection {
    fn new(outbound: mpsc::UnboundedSender<Message>, hello: &HelloOk) -> Self {
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
            methods: hello.features.methods.clone(),
            method_set: hello.features.methods.iter().cloned().collect(),
            protocol: hello.protocol,
            open: AtomicBool::new(true),
            closed: CancellationToken::new(),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Insert a pending entry under a fresh id. Registration happens before
    /// the frame is queued so a fast response always finds its entry.
    fn register(
        &self,
        method: &str,
    ) -> Result<(String, oneshot::Receiver<Result<serde_json::Value>>)> {
        let mut pending = lock(&self.pending);
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        let mut id = uuid::Uuid::new_v4().to_string();
        while pending.contains_key(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(id.clone(), PendingRequest {
            method: method.to_string(),
            sender: tx,
        });
        Ok((id, rx))
    }

    /// Removing an entry is what grants the right to settle it.
    fn take_pending(&self, id: &str) -> Option<PendingRequest> {
        lock(&self.pending).remove(id)
    }

    /// Reject everything in flight and mark the connection closed.
    /// Returns `false` when it was already closed.
    fn shut_down(&self) -> bool {
        let drained: Vec<PendingRequest> = {
            let mut pending = lock(&self.pending);
            if !self.open.swap(false, Ordering::SeqCst) {
                return false;
            }
            pending.drain().map(|(_, p)| p).collect()
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "rejecting pending requests");
        }
        for request in drained {
            let _ = request.sender.send(Err(Error::ConnectionClosed));
        }
        self.closed.cancel();
        true
    }

    fn terminate(&self) {
        if self.shut_down() {
            info!("closing gateway connection");
        }
        let _ = self.outbound.send(Message::Close(None));
    }
}

struct PendingGuard<'a> {
    conn: &'a Connection,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.conn.take_pending(self.id);
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

struct Shared {
    connection: Mutex<Option<Arc<Connection>>>,
    listeners: Mutex<Vec<(ListenerId, EventHandler)>>,
    next_listener: AtomicU64,
    request_timeout: Duration,
}

impl Shared {
    fn emit(&self, event: &EventFrame) {
        let handlers: Vec<EventHandler> = lock(&self.listeners)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    fn dispatch(&self, conn: &Connection, text: &str) {
        let frame = match GatewayFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "dropping malformed frame");
                return;
            },
        };
        match frame {
            GatewayFrame::Response(res) => match conn.take_pending(&res.id) {
                Some(request) => {
                    debug!(id = %res.id, method = %request.method, ok = res.ok, "response");
                    let _ = request.sender.send(res.into_result().map_err(Error::from));
                },
                None => debug!(id = %res.id, "dropping response for unknown request"),
            },
            GatewayFrame::Event(event) => self.emit(&event),
            GatewayFrame::Request(req) => {
                debug!(method = %req.method, "ignoring server-initiated request");
            },
        }
    }
}

/// Cheaply cloneable handle to a gateway connection.
#[derive(Clone)]
pub struct GatewayClient {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("connected", &self.is_connected())
            .field("request_timeout", &self.shared.request_timeout)
            .finish()
    }
}

impl Default for GatewayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayClient {
    pub fn new() -> Self {
        Self::with_request_timeout(Duration::from_millis(naia_protocol::REQUEST_TIMEOUT_MS))
    }

    pub fn with_request_timeout(request_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                connection: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                request_timeout,
            }),
        }
    }

    /// Open the socket, complete the handshake and start the I/O tasks.
    ///
    /// Any existing connection is closed first. On failure nothing is left
    /// running and the client stays disconnected.
    pub async fn connect(&self, url: &str, options: &ConnectOptions) -> Result<HelloOk> {
        self.close();
        info!(url, "connecting to gateway");

        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut stream) = ws.split();

        let hello = match tokio::time::timeout(
            options.handshake_timeout,
            handshake::perform(&mut sink, &mut stream, options),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(url, "gateway handshake timed out");
                return Err(Error::HandshakeTimeout);
            },
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Connection::new(tx, &hello));
        tokio::spawn(write_loop(sink, rx));
        tokio::spawn(read_loop(stream, Arc::clone(&conn), Arc::clone(&self.shared)));

        let previous = lock(&self.shared.connection).replace(conn);
        if let Some(previous) = previous {
            previous.terminate();
        }

        info!(
            protocol = hello.protocol,
            methods = hello.features.methods.len(),
            "gateway handshake complete"
        );
        Ok(hello)
    }

    /// Send `method` and wait for its response with the client's default
    /// timeout.
    pub async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.request_with_timeout(method, params, self.shared.request_timeout)
            .await
    }

    /// Like [`request`](Self::request) with an explicit timeout, for RPCs
    /// that block server-side (`agent.wait`).
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let conn = self.live_connection().ok_or(Error::NotConnected)?;
        let (id, mut rx) = conn.register(method)?;
        let _guard = PendingGuard {
            conn: &conn,
            id: &id,
        };

        let text = GatewayFrame::request(id.as_str(), method, params).to_json()?;
        debug!(%id, %method, "sending request");
        if conn.outbound.send(Message::Text(text.into())).is_err() {
            return Err(Error::ConnectionClosed);
        }

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                if conn.take_pending(&id).is_some() {
                    warn!(%id, %method, "request timed out");
                    Err(Error::Timeout {
                        method: method.to_string(),
                    })
                } else {
                    // Settled concurrently with the deadline.
                    rx.await.unwrap_or(Err(Error::ConnectionClosed))
                }
            },
        }
    }

    /// Register a listener for server-push events.
    pub fn on_event<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&EventFrame) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.listeners).push((id, Arc::new(handler)));
        id
    }

    pub fn off_event(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.shared.listeners);
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    /// Channel-backed listener that unregisters itself on drop.
    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.on_event(move |event| {
            let _ = tx.send(event.clone());
        });
        EventSubscription {
            client: self.clone(),
            id,
            rx,
        }
    }

    /// Reject in-flight requests, mark the client disconnected and close the
    /// socket. Safe to call repeatedly.
    pub fn close(&self) {
        let conn = lock(&self.shared.connection).take();
        if let Some(conn) = conn {
            conn.terminate();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.live_connection().is_some()
    }

    /// Methods advertised by the gateway during the handshake.
    pub fn available_methods(&self) -> Vec<String> {
        self.live_connection()
            .map(|conn| conn.methods.clone())
            .unwrap_or_default()
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.live_connection()
            .is_some_and(|conn| conn.method_set.contains(method))
    }

    pub fn protocol_version(&self) -> Option<u32> {
        self.live_connection().map(|conn| conn.protocol)
    }

    /// Cancelled once the current connection closes. Already cancelled when
    /// there is no live connection.
    pub fn closed_token(&self) -> CancellationToken {
        match self.live_connection() {
            Some(conn) => conn.closed.clone(),
            None => {
                let token = CancellationToken::new();
                token.cancel();
                token
            },
        }
    }

    fn live_connection(&self) -> Option<Arc<Connection>> {
        lock(&self.shared.connection)
            .as_ref()
            .filter(|conn| conn.is_open())
            .cloned()
    }
}

/// Events received while subscribed, in arrival order.
pub struct EventSubscription {
    client: GatewayClient,
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<EventFrame>,
}

impl EventSubscription {
    pub async fn recv(&mut self) -> Option<EventFrame> {
        self.rx.recv().await
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.client.off_event(self.id);
    }
}

// ── I/O tasks ────────────────────────────────────────────────────────────────

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!(error = %e, "gateway write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(mut stream: SplitStream<WsStream>, conn: Arc<Connection>, shared: Arc<Shared>) {
    loop {
        let message = tokio::select! {
            _ = conn.closed.cancelled() => break,
            message = stream.next() => message,
        };
        match message {
            Some(Ok(Message::Text(text))) => shared.dispatch(&conn, text.as_str()),
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "gateway sent close frame");
                break;
            },
            Some(Ok(_)) => {},
            Some(Err(e)) => {
                warn!(error = %e, "gateway connection error");
                break;
            },
            None => break,
        }
    }
    if conn.shut_down() {
        info!("gateway connection closed");
    }
    let _ = conn.outbound.send(Message::Close(None));
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::testing::{HandshakeMode, MockGateway, MockReply},
        naia_protocol::error_codes,
        serde_json::json,
    };

    #[tokio::test]
    async fn request_before_connect_fails_fast() {
        let client = GatewayClient::new();
        let err = client.request("health", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(err.to_string(), "Not connected to gateway");
        assert!(!client.is_connected());
        assert!(client.available_methods().is_empty());
    }

    #[tokio::test]
    async fn handshake_records_advertised_methods() {
        let mock = MockGateway::builder()
            .methods(&["chat.send", "health"])
            .start()
            .await;
        let client = GatewayClient::new();
        let hello = client
            .connect(&mock.url(), &ConnectOptions::new("secret-token"))
            .await
            .unwrap();

        assert_eq!(hello.protocol, 3);
        assert!(client.is_connected());
        assert_eq!(client.available_methods(), vec!["chat.send", "health"]);
        assert!(client.has_method("chat.send"));
        assert!(!client.has_method("agent"));
        assert_eq!(client.protocol_version(), Some(3));

        let params = mock.connect_params();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0]["auth"]["token"], "secret-token");
        assert_eq!(params[0]["minProtocol"], 3);
        assert_eq!(params[0]["maxProtocol"], 3);
        assert_eq!(params[0]["role"], "operator");
    }

    #[tokio::test]
    async fn handshake_rejection_surfaces_remote_message() {
        let mock = MockGateway::builder()
            .handshake(HandshakeMode::Reject {
                code: "UNAUTHORIZED".into(),
                message: "invalid token".into(),
            })
            .start()
            .await;
        let client = GatewayClient::new();
        let err = client
            .connect(&mock.url(), &ConnectOptions::new("bad"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid token");
        assert_eq!(err.code(), Some("UNAUTHORIZED"));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn handshake_times_out_when_gateway_never_answers() {
        let mock = MockGateway::builder()
            .handshake(HandshakeMode::Stall)
            .start()
            .await;
        let client = GatewayClient::new();
        let options = ConnectOptions {
            handshake_timeout: Duration::from_millis(150),
            ..ConnectOptions::new("tok")
        };
        let err = client.connect(&mock.url(), &options).await.unwrap_err();
        assert!(matches!(err, Error::HandshakeTimeout));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn close_during_handshake_is_reported() {
        let mock = MockGateway::builder()
            .handshake(HandshakeMode::CloseAfterChallenge)
            .start()
            .await;
        let client = GatewayClient::new();
        let err = client
            .connect(&mock.url(), &ConnectOptions::new("tok"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Connection closed during handshake");
    }

    #[tokio::test]
    async fn repeated_challenge_sends_one_connect() {
        let mock = MockGateway::builder()
            .handshake(HandshakeMode::DoubleChallenge)
            .start()
            .await;
        let client = GatewayClient::new();
        client
            .connect(&mock.url(), &ConnectOptions::new("tok"))
            .await
            .unwrap();
        assert_eq!(mock.connect_params().len(), 1);
    }

    #[tokio::test]
    async fn challenge_without_nonce_is_skipped() {
        let mock = MockGateway::builder()
            .handshake(HandshakeMode::NoncelessChallenge)
            .start()
            .await;
        let client = GatewayClient::new();
        client
            .connect(&mock.url(), &ConnectOptions::new("tok"))
            .await
            .unwrap();
        assert_eq!(mock.connect_params().len(), 1);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn out_of_order_responses_reach_their_callers() {
        let mock = MockGateway::builder()
            .methods(&["slow", "fast"])
            .handler(|method, _| match method {
                "slow" => MockReply::Delayed(
                    Duration::from_millis(150),
                    Box::new(MockReply::ok(json!("slow-result"))),
                ),
                _ => MockReply::ok(json!("fast-result")),
            })
            .start()
            .await;
        let client = mock.connected_client().await;

        let (slow, fast) = tokio::join!(
            client.request("slow", json!({})),
            client.request("fast", json!({}))
        );
        assert_eq!(slow.unwrap(), json!("slow-result"));
        assert_eq!(fast.unwrap(), json!("fast-result"));
    }

    #[tokio::test]
    async fn remote_error_keeps_code() {
        let mock = MockGateway::builder()
            .methods(&["sessions.delete"])
            .handler(|_, _| MockReply::error(error_codes::NOT_FOUND, "no such session"))
            .start()
            .await;
        let client = mock.connected_client().await;
        let err = client
            .request("sessions.delete", json!({"key": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("NOT_FOUND"));
        assert_eq!(err.to_string(), "no such session");
    }

    #[tokio::test]
    async fn request_times_out_and_late_response_is_ignored() {
        let mock = MockGateway::builder()
            .methods(&["late", "health"])
            .handler(|method, _| match method {
                "late" => MockReply::Delayed(
                    Duration::from_millis(250),
                    Box::new(MockReply::ok(json!("too late"))),
                ),
                _ => MockReply::ok(json!({"ok": true})),
            })
            .start()
            .await;
        let client = GatewayClient::with_request_timeout(Duration::from_millis(80));
        client
            .connect(&mock.url(), &ConnectOptions::new("tok"))
            .await
            .unwrap();

        let err = client.request("late", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Request late timed out");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(client.is_connected());
        assert_eq!(
            client.request("health", json!({})).await.unwrap(),
            json!({"ok": true})
        );
    }

    #[tokio::test]
    async fn close_rejects_pending_requests() {
        let mock = MockGateway::builder()
            .methods(&["hang"])
            .handler(|_, _| MockReply::Silent)
            .start()
            .await;
        let client = mock.connected_client().await;

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.request("hang", json!({})).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.close();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(!client.is_connected());
        assert!(matches!(
            client.request("hang", json!({})).await.unwrap_err(),
            Error::NotConnected
        ));
        assert!(client.closed_token().is_cancelled());
    }

    #[tokio::test]
    async fn server_disconnect_rejects_pending_requests() {
        let mock = MockGateway::builder()
            .methods(&["hang"])
            .handler(|_, _| MockReply::Silent)
            .start()
            .await;
        let client = mock.connected_client().await;
        let closed = client.closed_token();

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.request("hang", json!({})).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        mock.drop_connections();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        tokio::time::timeout(Duration::from_secs(2), closed.cancelled())
            .await
            .unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn listeners_run_in_registration_order() {
        let mock = MockGateway::builder().start().await;
        let client = mock.connected_client().await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        client.on_event({
            let seen = Arc::clone(&seen);
            move |evt| seen.lock().unwrap().push(format!("first:{}", evt.event))
        });
        client.on_event({
            let seen = Arc::clone(&seen);
            move |evt| {
                seen.lock().unwrap().push(format!("second:{}", evt.event));
                let _ = done_tx.send(());
            }
        });

        mock.push_event("tick", json!({}));
        done_rx.recv().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first:tick", "second:tick"]);
    }

    #[tokio::test]
    async fn responses_are_not_delivered_as_events() {
        let mock = MockGateway::builder()
            .methods(&["health"])
            .handler(|_, _| MockReply::ok(json!({})))
            .start()
            .await;
        let client = mock.connected_client().await;
        let mut events = client.subscribe();

        client.request("health", json!({})).await.unwrap();
        mock.push_event("marker", json!({}));
        let first = events.recv().await.unwrap();
        assert_eq!(first.event, "marker");
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped() {
        let mock = MockGateway::builder()
            .methods(&["health"])
            .handler(|_, _| MockReply::ok(json!("alive")))
            .start()
            .await;
        let client = mock.connected_client().await;

        mock.push_raw("this is not json");
        mock.push_raw(r#"{"type":"res","id":"nobody-asked","ok":true,"payload":1}"#);
        mock.push_raw(r#"{"type":"mystery"}"#);

        assert!(client.is_connected());
        assert_eq!(
            client.request("health", json!({})).await.unwrap(),
            json!("alive")
        );
    }

    #[tokio::test]
    async fn subscription_unregisters_on_drop() {
        let client = GatewayClient::new();
        let sub = client.subscribe();
        let id = client.on_event(|_| {});
        assert_eq!(lock(&client.shared.listeners).len(), 2);
        drop(sub);
        assert_eq!(lock(&client.shared.listeners).len(), 1);
        assert!(client.off_event(id));
        assert!(!client.off_event(id));
    }

    #[tokio::test]
    async fn reconnect_replaces_previous_connection() {
        let first = MockGateway::builder().methods(&["a"]).start().await;
        let second = MockGateway::builder().methods(&["b"]).start().await;
        let client = GatewayClient::new();

        client
            .connect(&first.url(), &ConnectOptions::new("tok"))
            .await
            .unwrap();
        let old_closed = client.closed_token();
        client
            .connect(&second.url(), &ConnectOptions::new("tok"))
            .await
            .unwrap();

        assert!(old_closed.is_cancelled());
        assert_eq!(client.available_methods(), vec!["b"]);
    }
}
