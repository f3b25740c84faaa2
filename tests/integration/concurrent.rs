use crate::*;
use ferry_transfer::TransferStatus;
use tokio::task::JoinSet;

// ══════════════════════════════════════════════════════════════════════════════
//  Concurrency — independent sessions over one server
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn parallel_sessions_do_not_interfere() {
    let server = TestServer::spawn(1024, |_| FaultPlan::none()).await.unwrap();

    let mut tasks = JoinSet::new();
    for client in 0..8u8 {
        let addr = server.addr;
        tasks.spawn(async move {
            // Distinct size and contents per client.
            let data = Bytes::from(vec![client; 3_000 + client as usize * 700]);
            let outcome = round_trip(addr, data.clone()).await.unwrap();
            (client, data, outcome)
        });
    }

    let mut session_ids = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (client, data, outcome) = joined.unwrap();
        assert_eq!(
            outcome.report.status,
            TransferStatus::Success,
            "client {client} failed"
        );
        assert_eq!(outcome.data.unwrap(), data, "client {client} data mismatch");
        session_ids.push(outcome.report.session_id);
    }

    session_ids.sort_unstable();
    session_ids.dedup();
    assert_eq!(session_ids.len(), 8, "session ids must be unique");
}

#[tokio::test]
async fn faulted_session_does_not_disturb_clean_ones() {
    // Session-keyed plans: only even sessions get a fault.
    let server = TestServer::spawn(1024, |session_id| {
        if session_id % 2 == 0 {
            FaultPlan::none().with_corrupt_once(1)
        } else {
            FaultPlan::none()
        }
    })
    .await
    .unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..6 {
        let addr = server.addr;
        tasks.spawn(async move { round_trip(addr, patterned(4_000)).await.unwrap() });
    }

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.unwrap();
        assert_eq!(outcome.report.status, TransferStatus::Success);
        assert_eq!(outcome.data.unwrap(), patterned(4_000));
    }
}
