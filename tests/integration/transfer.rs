use crate::*;
use ferry_transfer::TransferStatus;

// ══════════════════════════════════════════════════════════════════════════════
//  Transfer — clean round trips over TCP
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn round_trip_multi_chunk_file() {
    let server = TestServer::spawn(1024, |_| FaultPlan::none()).await.unwrap();

    let data = patterned(10_000);
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.report.total_chunks, 10);
    assert_eq!(outcome.report.bytes_transferred, 10_000);
    assert_eq!(outcome.report.resend_requests, 0);
    assert_eq!(outcome.data.unwrap(), data);
}

#[tokio::test]
async fn round_trip_file_smaller_than_one_chunk() {
    let server = TestServer::spawn(1024, |_| FaultPlan::none()).await.unwrap();

    let data = Bytes::from_static(b"short payload");
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.report.total_chunks, 1);
    assert_eq!(outcome.data.unwrap(), data);
}

#[tokio::test]
async fn round_trip_exact_chunk_multiple() {
    let server = TestServer::spawn(512, |_| FaultPlan::none()).await.unwrap();

    // Exactly 8 full chunks, no short tail.
    let data = patterned(4096);
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.total_chunks, 8);
    assert_eq!(outcome.data.unwrap(), data);
}

#[tokio::test]
async fn round_trip_empty_file() {
    let server = TestServer::spawn(1024, |_| FaultPlan::none()).await.unwrap();

    let outcome = round_trip(server.addr, Bytes::new()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.report.total_chunks, 0);
    assert_eq!(outcome.data.unwrap().len(), 0);
}

#[tokio::test]
async fn round_trip_large_file() {
    let server = TestServer::spawn(4096, |_| FaultPlan::none()).await.unwrap();

    let data = patterned(1024 * 1024);
    let outcome = round_trip(server.addr, data.clone()).await.unwrap();

    assert_eq!(outcome.report.status, TransferStatus::Success);
    assert_eq!(outcome.report.total_chunks, 256);
    assert_eq!(outcome.data.unwrap(), data);
}

#[tokio::test]
async fn registry_drains_after_session_ends() {
    let server = TestServer::spawn(1024, |_| FaultPlan::none()).await.unwrap();

    round_trip(server.addr, patterned(2048)).await.unwrap();

    // The worker removes its entry after the client closes; poll briefly.
    for _ in 0..50 {
        if server.registry.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session registry still has entries after transfer completed");
}
