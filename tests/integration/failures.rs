use crate::*;
use ferry_core::digest::FILE_DIGEST_LEN;
use ferry_core::{Frame, TransferError, TransferMeta, TransportError};
use ferry_transfer::TransferStatus;

// ══════════════════════════════════════════════════════════════════════════════
//  Failures — servers that misbehave in ways the real sender never does
// ══════════════════════════════════════════════════════════════════════════════

/// Bind a one-shot listener and run `serve` on the first connection.
async fn one_shot_server<F, Fut>(serve: F) -> SocketAddr
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        serve(socket).await;
    });
    addr
}

#[tokio::test]
async fn server_closing_mid_transfer_yields_incomplete() {
    let addr = one_shot_server(|socket| async move {
        let mut stream = FrameStream::new(socket, IO_TIMEOUT);
        let blob = stream.read_blob(MAX_UPLOAD).await.unwrap();
        let meta = TransferMeta {
            session_id: 0,
            total_chunks: 4,
            file_len: blob.len() as u64,
            file_digest: file_digest(&blob),
        };
        stream.write_meta(&meta).await.unwrap();
        // Two of four chunks, then the connection drops.
        stream
            .write_frame(&Frame::data(0, 0, blob.slice(0..1024)))
            .await
            .unwrap();
        stream
            .write_frame(&Frame::data(0, 1, blob.slice(1024..2048)))
            .await
            .unwrap();
        stream.shutdown().await.unwrap();
    })
    .await;

    let outcome = round_trip(addr, patterned(4096)).await.unwrap();
    assert_eq!(outcome.report.status, TransferStatus::Incomplete);
    assert_eq!(outcome.report.missing_seq_nums, vec![2, 3]);
    assert!(outcome.data.is_none());
}

#[tokio::test]
async fn oversized_upload_is_rejected_and_connection_dies() {
    let addr = one_shot_server(|socket| async move {
        let mut stream = FrameStream::new(socket, IO_TIMEOUT);
        // Tight upload bound; the client's blob exceeds it.
        let err = stream.read_blob(1024).await.unwrap_err();
        assert!(matches!(err, TransferError::Frame(_)));
    })
    .await;

    // The server never sends metadata. Depending on timing the client sees
    // either a clean close or a connection reset.
    let err = round_trip(addr, patterned(4096)).await.unwrap_err();
    let err: TransferError = err.downcast().unwrap();
    assert!(matches!(
        err,
        TransferError::Transport(TransportError::Closed) | TransferError::Io(_)
    ));
}

#[tokio::test]
async fn silent_server_times_out() {
    let addr = one_shot_server(|socket| async move {
        // Hold the connection open, send nothing.
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    })
    .await;

    let socket = TcpStream::connect(addr).await.unwrap();
    let mut stream = FrameStream::new(socket, Duration::from_millis(100));
    stream.write_blob(&patterned(512)).await.unwrap();

    let receiver = ReceiverSession::new(3);
    let err = receiver.run(&mut stream).await.unwrap_err();
    assert!(matches!(
        err,
        TransferError::Transport(TransportError::Timeout)
    ));
}

#[tokio::test]
async fn declared_digest_mismatch_fails_the_transfer() {
    let addr = one_shot_server(|socket| async move {
        let mut stream = FrameStream::new(socket, IO_TIMEOUT);
        let blob = stream.read_blob(MAX_UPLOAD).await.unwrap();
        let meta = TransferMeta {
            session_id: 0,
            total_chunks: 1,
            file_len: blob.len() as u64,
            // Deliberately wrong whole-file digest.
            file_digest: [0x42u8; FILE_DIGEST_LEN],
        };
        stream.write_meta(&meta).await.unwrap();
        stream.write_frame(&Frame::data(0, 0, blob)).await.unwrap();
        stream
            .write_frame(&Frame::end_of_transmission(0))
            .await
            .unwrap();
        while let Ok(Some(_)) = stream.read_resend().await {}
    })
    .await;

    let outcome = round_trip(addr, patterned(100)).await.unwrap();
    assert_eq!(outcome.report.status, TransferStatus::ChecksumMismatch);
    assert!(outcome.data.is_none());
}
