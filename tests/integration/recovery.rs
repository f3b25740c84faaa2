use crate::*;
use ferry_transfer::TransferStatus;

// ══════════════════════════════════════════════════════════════════════════════
//  Recovery — fault injection on the initial pass, resend on demand
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn corrupted_chunk_recovers_with_one_resend() {
    let server = TestServer::spawn(1024, |_| FaultPlan::none().with_corrupt_once(4))
        .await
        .unwrap();

    let data = patterned(10_000);
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.report.resend_requests, 1);
    assert_eq!(outcome.data.unwrap(), data);
}

#[tokio::test]
async fn dropped_chunk_recovers() {
    let server = TestServer::spawn(1024, |_| FaultPlan::none().with_drop_once(0))
        .await
        .unwrap();

    let data = patterned(5_000);
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.report.resend_requests, 1);
    assert_eq!(outcome.data.unwrap(), data);
}

#[tokio::test]
async fn mixed_faults_all_recover() {
    let server = TestServer::spawn(1024, |_| {
        FaultPlan::none()
            .with_corrupt_once(1)
            .with_drop_once(3)
            .with_corrupt_once(6)
    })
    .await
    .unwrap();

    let data = patterned(8_000);
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.report.resend_requests, 3);
    assert_eq!(outcome.data.unwrap(), data);
}

#[tokio::test]
async fn corrupting_the_last_chunk_recovers() {
    let server = TestServer::spawn(1024, |_| FaultPlan::none().with_corrupt_once(9))
        .await
        .unwrap();

    // Short final chunk, and it is the faulted one.
    let data = patterned(9_500);
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.data.unwrap(), data);
}

#[tokio::test]
async fn random_faults_converge() {
    // 20% corruption on the first pass. Retransmissions are never faulted,
    // so every transfer converges within one recovery round per chunk.
    let server = TestServer::spawn(512, |_| FaultPlan::random(20, 0))
        .await
        .unwrap();

    let data = patterned(32 * 1024);
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.data.unwrap(), data);
}
