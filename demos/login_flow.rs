// demos/login_flow.rs
//
// SESSION_CLIENT_API_BASE=http://localhost:8080 \
//   cargo run --example login_flow -- alice@example.com hunter2

use session_client::services::KvService;
use session_client::{AppStore, ClientConfig, FileTokenStore, Result, SessionClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ClientConfig::from_env()?.with_debug_logging(true);

    let mut args = std::env::args().skip(1);
    let email = args.next().unwrap_or_else(|| "demo@example.com".to_string());
    let password = args.next().unwrap_or_else(|| "demo".to_string());

    let store = Arc::new(FileTokenStore::new(".session.json"));
    let client = SessionClient::with_store(config, store)?;
    let app = AppStore::new(client);

    println!("=== Login Flow ===");

    // 1. Reuse a persisted session if there is one
    if app.init().await {
        println!("Restored session for {:?}", app.get_user().await);
    } else {
        // 2. Otherwise sign in
        let user = app.sign_in(&email, &password).await?;
        println!("Signed in as {}", user.id);
    }

    // 3. Authenticated calls refresh the token on their own when it expires
    let kv = app.kv();
    kv.set("last_login", &chrono::Utc::now().to_rfc3339()).await?;
    println!("last_login = {:?}", kv.get("last_login").await?);

    // 4. Sign out clears the stored token
    app.sign_out().await?;
    println!("Signed out; state = {:?}", app.state().await);

    Ok(())
}
