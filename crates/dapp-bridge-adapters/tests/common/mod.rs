#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use alloy::primitives::B256;
use serde_json::{json, Value};
use tiny_http::{Response, Server, StatusCode};
use tokio::sync::mpsc::UnboundedReceiver;

use dapp_bridge_adapters::{BridgeConfig, BridgeOutput, InMemoryDataSource};
use dapp_bridge_core::{Account, ChainDescriptor};

pub const POLKADOT_GENESIS: &str =
    "0x91b171bb158e2d3848fa23a9f1c25182fb8e20313b2c1eb49219da7a70ce90c3";
pub const POLKADOT_ADDRESS: &str = "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5";
pub const DAPP_URL: &str = "https://staking.example.org/validators";

/// Routes `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// JSON-RPC node answering `state_getRuntimeVersion`. Request bodies are
/// recorded in `calls`.
pub fn spawn_mock_node(spec_version: u32, calls: Arc<Mutex<Vec<Value>>>) -> String {
    let server = Server::http("127.0.0.1:0").expect("start mock node");
    let addr = format!("http://{}", server.server_addr());

    thread::spawn(move || {
        while let Ok(mut req) = server.recv() {
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let method = parsed.get("method").and_then(Value::as_str).map(str::to_owned);
            if let Ok(mut g) = calls.lock() {
                g.push(parsed);
            }

            let (code, payload) = match method.as_deref() {
                Some("state_getRuntimeVersion") => (
                    200,
                    json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "result": {"specName": "polkadot", "specVersion": spec_version}
                    }),
                ),
                _ => (
                    200,
                    json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "error": {"code": -32601, "message": "Method not found"}
                    }),
                ),
            };
            let response =
                Response::from_string(payload.to_string()).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    addr
}

/// Node that accepts requests and never answers them.
pub fn spawn_hanging_node() -> String {
    let server = Server::http("127.0.0.1:0").expect("start hanging node");
    let addr = format!("http://{}", server.server_addr());

    thread::spawn(move || {
        let mut held = Vec::new();
        while let Ok(req) = server.recv() {
            held.push(req);
        }
    });

    addr
}

pub fn genesis() -> B256 {
    POLKADOT_GENESIS.parse().expect("valid genesis hash")
}

pub fn polkadot_chain(node_url: Option<String>) -> ChainDescriptor {
    ChainDescriptor {
        genesis_hash: genesis(),
        name: "Polkadot".to_owned(),
        address_prefix: 0,
        node_url,
    }
}

pub fn polkadot_account() -> Account {
    Account {
        address: POLKADOT_ADDRESS.to_owned(),
        name: Some("Stash".to_owned()),
        genesis_hash: None,
        crypto_type: Some("sr25519".to_owned()),
    }
}

pub fn store_with_polkadot(node_url: Option<String>) -> InMemoryDataSource {
    let store = InMemoryDataSource::default();
    store
        .insert_chain(polkadot_chain(node_url))
        .expect("insert chain");
    store
        .insert_account(polkadot_account(), Some(genesis()))
        .expect("insert account");
    store
}

pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        spec_version_timeout_ms: 2_000,
        ..BridgeConfig::default()
    }
}

pub fn envelope(identifier: &str, msg_type: &str, request: Value) -> Value {
    json!({
        "identifier": identifier,
        "msgType": msg_type,
        "request": request,
        "url": DAPP_URL
    })
}

pub fn authorize_envelope(identifier: &str) -> Value {
    envelope(identifier, "pub(authorize.tab)", json!({"origin": "Staking"}))
}

pub fn provide_metadata_envelope(identifier: &str, spec_version: u32) -> Value {
    envelope(
        identifier,
        "pub(metadata.provide)",
        json!({
            "chain": "Polkadot",
            "genesisHash": POLKADOT_GENESIS,
            "specVersion": spec_version,
            "ss58Format": 0,
            "tokenDecimals": 10,
            "tokenSymbol": "DOT",
            "types": {}
        }),
    )
}

pub fn sign_extrinsic_envelope(identifier: &str) -> Value {
    envelope(
        identifier,
        "pub(extrinsic.sign)",
        json!({
            "address": POLKADOT_ADDRESS,
            "blockHash": "0x2fad67977d3e2235f745f88f8c4149182f9ee717f871dd5aa66a336049417221",
            "blockNumber": "0x00723632",
            "era": "0x2503",
            "genesisHash": POLKADOT_GENESIS,
            "method": "0x0503",
            "nonce": "0x0000000f",
            "specVersion": "0x0000235a",
            "tip": "0x00000000000000000000000000000000",
            "transactionVersion": "0x00000003",
            "signedExtensions": ["CheckSpecVersion"],
            "version": 4
        }),
    )
}

pub async fn next_output(rx: &mut UnboundedReceiver<BridgeOutput>) -> BridgeOutput {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("bridge output within timeout")
        .expect("output channel open")
}

/// Drains outputs until the session drops its senders.
pub async fn remaining_outputs(rx: &mut UnboundedReceiver<BridgeOutput>) -> Vec<BridgeOutput> {
    let mut out = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(output)) => out.push(output),
            Ok(None) => return out,
            Err(_) => panic!("session did not close its output channel"),
        }
    }
}

pub fn script_of(output: &BridgeOutput) -> String {
    output
        .script()
        .map(|s| s.content.clone())
        .unwrap_or_default()
}
