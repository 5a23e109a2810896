//! Function-proxy host demo.
//!
//! Simulates an embedder: a function-shaped host delegate answers every
//! method, the bridge registers extensions and ready callbacks before the
//! handshake, and page-side code invokes a method with a result callback.
//!
//! Run with: `cargo run --example function_host`

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use webview_bridge::{Bridge, CapabilitySet, Delegate};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("webview_bridge=debug"))
        .with_target(false)
        .init();

    let bridge = Bridge::new();

    // Registered before the handshake: queued, then replayed in order.
    bridge.extend(|config| {
        println!("extension sees platform = {}", config.get_str("platform"));
        CapabilitySet::new().with("greeting", String::from("hello from extension"))
    });

    let ready_bridge = bridge.clone();
    bridge.on_ready(move || {
        let greeting: Arc<String> = ready_bridge
            .capability("greeting")
            .expect("extension ran first");
        println!("ready! capability = {greeting}");
    });

    // The host: one function receives every method.
    let host_bridge = bridge.clone();
    bridge.register(Delegate::function_fn(move |method, params, token| {
        println!("host received {method}({params:?})");
        let Some(token) = token else { return };

        match method {
            "ready" => {
                // Handshake: answer with the initial configuration.
                host_bridge.dispatch(
                    token.as_str(),
                    vec![json!({"platform": "demo", "apiLevel": 3})],
                );
            }
            "getUser" => {
                host_bridge.dispatch(token.as_str(), vec![json!({"name": "Ada"})]);
            }
            _ => {
                host_bridge.dispatch(token.as_str(), vec![Value::Null]);
            }
        }
    }));

    // Embedder signals document load; the handshake goes out.
    bridge.notify_load_complete();

    bridge.invoke_with("getUser", vec![json!("self")], |args| {
        println!("page got user: {args:?}");
        Value::Null
    });

    // Cookie cache: write-through within the turn.
    bridge.cookies().write("session", "abc123");
    println!("session cookie = {:?}", bridge.cookies().read("session"));

    // Let deferred tasks drain before exiting.
    tokio::time::sleep(Duration::from_millis(50)).await;
}
