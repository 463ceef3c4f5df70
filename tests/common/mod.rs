#![allow(dead_code)]

use std::net::SocketAddr;

use harvest_sync::auth::{sign_token, JwtClaims};
use harvest_sync::store::worlds::WorldSetup;
use harvest_sync::{build_router, AppState, Config};
use tokio::net::TcpListener;

pub const SECRET: &str = "integration-secret";

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(Config::for_tests(SECRET)).await
    }

    /// Start with a tweaked test config; the secret stays the shared one
    pub async fn start_with(config: Config) -> Self {
        let state = AppState::new(Config {
            jwt_secret: SECRET.to_string(),
            ..config
        });
        let router = build_router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn world_for(&self, player_id: &str, seed: u64) -> WorldSetup {
        self.state
            .worlds
            .create_world(&player_id.to_string(), seed)
            .await
            .unwrap()
    }
}

pub fn token_for(player_id: &str) -> String {
    sign_token(&JwtClaims::for_player(player_id, 3600), SECRET).unwrap()
}
