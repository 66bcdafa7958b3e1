//! In-process gateway for tests.
//!
//! Speaks the real wire protocol over a loopback WebSocket: sends the
//! connect challenge, answers `connect` according to [`HandshakeMode`], then
//! routes every other request through a handler closure. Tests can push
//! events or raw frames and drop connections at will.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    futures::{SinkExt, StreamExt},
    naia_protocol::{ErrorShape, EventFrame, GatewayFrame, ResponseFrame, error_codes, events},
    tokio::{net::TcpListener, sync::mpsc, task::JoinHandle},
    tokio_tungstenite::tungstenite::Message,
};

use crate::{client::GatewayClient, handshake::ConnectOptions};

/// How the mock answers a request.
#[derive(Debug, Clone)]
pub enum MockReply {
    Ok(serde_json::Value),
    Error { code: String, message: String },
    /// Never answer.
    Silent,
    Delayed(Duration, Box<MockReply>),
    /// Answer, then push `(event, payload)` pairs in order.
    OkThenEvents(serde_json::Value, Vec<(String, serde_json::Value)>),
}

impl MockReply {
    pub fn ok(payload: serde_json::Value) -> Self {
        Self::Ok(payload)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum HandshakeMode {
    #[default]
    Accept,
    Reject {
        code: String,
        message: String,
    },
    /// Send the challenge, never answer `connect`.
    Stall,
    /// Send the challenge, then close the socket.
    CloseAfterChallenge,
    /// Send the challenge twice before answering.
    DoubleChallenge,
    /// Send a challenge with no nonce before the real one.
    NoncelessChallenge,
}

pub type MockHandler = Arc<dyn Fn(&str, &serde_json::Value) -> MockReply + Send + Sync>;

struct MockState {
    methods: Vec<String>,
    handler: MockHandler,
    handshake: HandshakeMode,
    connect_params: Mutex<Vec<serde_json::Value>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    peers: Mutex<Vec<mpsc::UnboundedSender<Message>>>,
}

pub struct MockGatewayBuilder {
    methods: Vec<String>,
    handler: MockHandler,
    handshake: HandshakeMode,
}

impl MockGatewayBuilder {
    pub fn methods(mut self, methods: &[&str]) -> Self {
        self.methods = methods.iter().map(|m| (*m).to_string()).collect();
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &serde_json::Value) -> MockReply + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    pub fn handshake(mut self, mode: HandshakeMode) -> Self {
        self.handshake = mode;
        self
    }

    pub async fn start(self) -> MockGateway {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let state = Arc::new(MockState {
            methods: self.methods,
            handler: self.handler,
            handshake: self.handshake,
            connect_params: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            peers: Mutex::new(Vec::new()),
        });

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                tokio::spawn(serve(tcp, Arc::clone(&accept_state)));
            }
        });

        MockGateway {
            addr,
            state,
            accept_task,
        }
    }
}

pub struct MockGateway {
    addr: SocketAddr,
    state: Arc<MockState>,
    accept_task: JoinHandle<()>,
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl MockGateway {
    pub fn builder() -> MockGatewayBuilder {
        MockGatewayBuilder {
            methods: Vec::new(),
            handler: Arc::new(|method: &str, _: &serde_json::Value| {
                MockReply::error(error_codes::UNKNOWN_METHOD, format!("unknown method: {method}"))
            }),
            handshake: HandshakeMode::Accept,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// A client connected with a throwaway token.
    pub async fn connected_client(&self) -> GatewayClient {
        let client = GatewayClient::new();
        client
            .connect(&self.url(), &ConnectOptions::new("test-token"))
            .await
            .expect("connect to mock gateway");
        client
    }

    /// Params of every `connect` request received so far.
    pub fn connect_params(&self) -> Vec<serde_json::Value> {
        self.state.connect_params.lock().expect("lock").clone()
    }

    /// Every non-handshake request received so far, in order.
    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.state.calls.lock().expect("lock").clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<serde_json::Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params)
            .collect()
    }

    pub fn push_event(&self, event: &str, payload: serde_json::Value) {
        self.push_raw(&event_json(event, payload));
    }

    pub fn push_raw(&self, text: &str) {
        for peer in self.state.peers.lock().expect("lock").iter() {
            let _ = peer.send(Message::Text(text.to_string().into()));
        }
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        for peer in self.state.peers.lock().expect("lock").drain(..) {
            let _ = peer.send(Message::Close(None));
        }
    }
}

fn event_json(event: &str, payload: serde_json::Value) -> String {
    GatewayFrame::Event(EventFrame::new(event, payload))
        .to_json()
        .expect("encode event")
}

/// Challenge frames use the `"event"` tag spelling.
fn challenge_json() -> String {
    serde_json::json!({
        "type": "event",
        "event": events::CONNECT_CHALLENGE,
        "payload": {"nonce": uuid::Uuid::new_v4().to_string()},
    })
    .to_string()
}

fn response_json(frame: ResponseFrame) -> String {
    GatewayFrame::Response(frame).to_json().expect("encode response")
}

async fn serve(tcp: tokio::net::TcpStream, state: Arc<MockState>) {
    let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });
    state.peers.lock().expect("lock").push(tx.clone());

    if matches!(state.handshake, HandshakeMode::NoncelessChallenge) {
        let bare = event_json(events::CONNECT_CHALLENGE, serde_json::json!({}));
        let _ = tx.send(Message::Text(bare.into()));
    }
    let _ = tx.send(Message::Text(challenge_json().into()));
    match state.handshake {
        HandshakeMode::DoubleChallenge => {
            let _ = tx.send(Message::Text(challenge_json().into()));
        },
        HandshakeMode::CloseAfterChallenge => {
            let _ = tx.send(Message::Close(None));
            let _ = writer.await;
            return;
        },
        _ => {},
    }

    while let Some(Ok(message)) = source.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(GatewayFrame::Request(req)) = GatewayFrame::parse(text.as_str()) else {
            continue;
        };

        if req.method == naia_protocol::methods::CONNECT {
            state
                .connect_params
                .lock()
                .expect("lock")
                .push(req.params.clone());
            let reply = match &state.handshake {
                HandshakeMode::Reject { code, message } => Some(ResponseFrame::err(
                    req.id,
                    ErrorShape::new(code.clone(), message.clone()),
                )),
                HandshakeMode::Stall => None,
                _ => Some(ResponseFrame::ok(
                    req.id,
                    serde_json::json!({
                        "protocol": naia_protocol::PROTOCOL_VERSION,
                        "features": {"methods": &state.methods, "events": []},
                    }),
                )),
            };
            if let Some(reply) = reply {
                let _ = tx.send(Message::Text(response_json(reply).into()));
            }
            continue;
        }

        state
            .calls
            .lock()
            .expect("lock")
            .push((req.method.clone(), req.params.clone()));
        let reply = (state.handler)(&req.method, &req.params);
        tokio::spawn(deliver(tx.clone(), req.id, reply));
    }

    writer.abort();
}

async fn deliver(tx: mpsc::UnboundedSender<Message>, id: String, mut reply: MockReply) {
    while let MockReply::Delayed(delay, inner) = reply {
        tokio::time::sleep(delay).await;
        reply = *inner;
    }
    let send = |text: String| {
        let _ = tx.send(Message::Text(text.into()));
    };
    match reply {
        MockReply::Ok(payload) => send(response_json(ResponseFrame::ok(id, payload))),
        MockReply::Error { code, message } => {
            send(response_json(ResponseFrame::err(id, ErrorShape::new(code, message))));
        },
        MockReply::OkThenEvents(payload, events) => {
            send(response_json(ResponseFrame::ok(id, payload)));
            for (event, payload) in events {
                send(event_json(&event, payload));
            }
        },
        MockReply::Silent | MockReply::Delayed(..) => {},
    }
}
