//! End-to-end submission flow over a mocked ledger endpoint
//!
//! Exercises the real JSON-RPC client, the local signer, and the
//! submission engine together against an HTTP stub.

use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use serde_json::json;

use spaces_client::types::{AttemptState, Intent};
use spaces_client::{Address, LocalSigner, SubmitEngine, VmClient, WalletSession};

fn method_matcher(method: &str) -> Matcher {
    Matcher::PartialJson(json!({ "method": method }))
}

async fn wait_for_terminal(engine: &Arc<SubmitEngine>, id: spaces_client::AttemptId) -> AttemptState {
    let mut events = engine.subscribe();
    // the snapshot may already be terminal by the time we subscribe
    loop {
        if let Some(snapshot) = engine.attempt(id) {
            if !snapshot.state.is_in_flight() && snapshot.state != AttemptState::Idle {
                return snapshot.state;
            }
        }
        match tokio::time::timeout(Duration::from_millis(200), events.recv()).await {
            Ok(Ok(event)) if event.id == id && !event.state.is_in_flight() => return event.state,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_transfer_roundtrip_through_http() {
    let mut server = mockito::Server::new_async().await;

    let _balance = server
        .mock("POST", "/")
        .match_body(method_matcher("spacesvm.balance"))
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"balance":50000}}"#)
        .create_async()
        .await;
    let _fee = server
        .mock("POST", "/")
        .match_body(method_matcher("spacesvm.suggestedFee"))
        .with_body(
            r#"{"jsonrpc":"2.0","id":2,"result":{"typedData":{"tx":"transfer","fee":100},"totalCost":100}}"#,
        )
        .create_async()
        .await;
    let issue = server
        .mock("POST", "/")
        .match_body(method_matcher("spacesvm.issueTx"))
        .with_body(r#"{"jsonrpc":"2.0","id":3,"result":{"txId":"deadbeef","success":true}}"#)
        .create_async()
        .await;

    let client = Arc::new(VmClient::new(server.url(), Duration::from_secs(5)).unwrap());
    let signer = Arc::new(LocalSigner::from_seed([9u8; 32]));
    let session = WalletSession::connect(signer.address().clone());
    let engine = SubmitEngine::new(client, signer);

    let id = engine.submit(
        &session,
        Intent::Transfer {
            to: Address::parse("0x0000000000000000000000000000000000000042").unwrap(),
            units: 1_000,
        },
        None,
    );

    let state = wait_for_terminal(&engine, id).await;
    assert_eq!(state, AttemptState::Done);
    issue.assert_async().await;
}

#[tokio::test]
async fn test_ledger_rejection_surfaces_as_failure() {
    let mut server = mockito::Server::new_async().await;

    let _fee = server
        .mock("POST", "/")
        .match_body(method_matcher("spacesvm.suggestedFee"))
        .with_body(
            r#"{"jsonrpc":"2.0","id":1,"result":{"typedData":{"tx":"claim","fee":250},"totalCost":250}}"#,
        )
        .create_async()
        .await;
    let _issue = server
        .mock("POST", "/")
        .match_body(method_matcher("spacesvm.issueTx"))
        .with_body(r#"{"jsonrpc":"2.0","id":2,"result":{"success":false}}"#)
        .create_async()
        .await;

    let client = Arc::new(VmClient::new(server.url(), Duration::from_secs(5)).unwrap());
    let signer = Arc::new(LocalSigner::from_seed([9u8; 32]));
    let session = WalletSession::connect(signer.address().clone());
    let engine = SubmitEngine::new(client, signer);

    let id = engine.submit(
        &session,
        Intent::Claim {
            space: spaces_client::SpaceId::parse("demo").unwrap(),
        },
        None,
    );

    let state = wait_for_terminal(&engine, id).await;
    assert_eq!(state, AttemptState::Failed);
    let snapshot = engine.attempt(id).unwrap();
    assert!(snapshot.last_error.unwrap().contains("rejected"));
}
