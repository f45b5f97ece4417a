//! Rollroom server binary.
//!
//! ```bash
//! ROLLROOM_ADDR=0.0.0.0:8080 ROLLROOM_ROLL=2d6 RUST_LOG=rollroom=debug roll-server
//! ```
//!
//! Clients connect to `ws://<addr>/<room>`.

use rollroom::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

async fn build(addr: &str, roll: Option<&str>) -> Result<Server, RollroomError> {
    let room_config = match roll {
        Some(spec) => RoomConfig { default_roll: DiceRoll::parse(spec)? },
        None => RoomConfig::default(),
    };
    Server::builder().bind(addr).room_config(room_config).build().await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let addr = std::env::var("ROLLROOM_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let roll = std::env::var("ROLLROOM_ROLL").ok();

    let server = build(&addr, roll.as_deref()).await?;
    tracing::info!(addr = %server.local_addr(), "roll server listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollroom_client::Client;

    #[tokio::test]
    async fn test_demo_server_rolls_default_dice() {
        let server = build("127.0.0.1:0", Some("3d6")).await.unwrap();
        let endpoint = format!("http://{}", server.local_addr());
        tokio::spawn(server.run());

        let mut client = Client::connect(&endpoint, "table", "alice").await.unwrap();
        client.join("").await.unwrap();
        let rows = client.next_update().await.unwrap().unwrap();
        assert!((3..=18).contains(&rows[0].value));
        assert_eq!(client.view().snapshot().unwrap().roll_spec, "3d6");
    }

    #[tokio::test]
    async fn test_bad_default_roll_is_rejected() {
        let err = build("127.0.0.1:0", Some("many dice")).await.err().unwrap();
        assert!(matches!(err, RollroomError::Dice(_)));
    }
}
