//! ferry-ctl — command-line client for the Ferry daemon.
//!
//! `send` uploads a file to ferryd, receives it back as verified chunks,
//! and reports the transfer outcome. The received copy is compared against
//! the local file digest, so a success here means the full round trip was
//! bit-exact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::net::TcpStream;

use ferry_core::file_digest;
use ferry_transfer::{FrameStream, ReceiverOutcome, ReceiverSession, TransferStatus};

const DEFAULT_ADDR: &str = "127.0.0.1:4815";
const DEFAULT_MAX_RESEND_ATTEMPTS: u32 = 3;
const IO_TIMEOUT: Duration = Duration::from_secs(30);

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_send(addr: &str, file: &str, output: Option<&Path>, json: bool) -> Result<()> {
    let data = Bytes::from(
        std::fs::read(file).with_context(|| format!("failed to read file: {file}"))?,
    );
    let local_digest = file_digest(&data);

    let socket = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to ferryd at {addr} — is it running?"))?;
    let mut stream = FrameStream::new(socket, IO_TIMEOUT);

    stream.write_blob(&data).await.context("upload failed")?;

    let receiver = ReceiverSession::new(DEFAULT_MAX_RESEND_ATTEMPTS);
    let outcome = receiver.run(&mut stream).await.context("transfer failed")?;
    stream.shutdown().await.ok();

    if let (Some(path), Some(received)) = (output, outcome.data.as_ref()) {
        std::fs::write(path, received)
            .with_context(|| format!("failed to write output file: {}", path.display()))?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        print_report(file, &outcome, local_digest);
    }

    let echoed_back_intact = outcome
        .data
        .map(|received| file_digest(&received) == local_digest)
        .unwrap_or(false);
    if outcome.report.status != TransferStatus::Success || !echoed_back_intact {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(file: &str, outcome: &ReceiverOutcome, local_digest: [u8; 32]) {
    let report = &outcome.report;
    println!("═══════════════════════════════════════");
    println!("  Transfer Report");
    println!("═══════════════════════════════════════");
    println!("  File             : {file}");
    println!("  Status           : {}", report.status);
    println!("  Session          : {}", report.session_id);
    println!("  Chunks           : {}", report.total_chunks);
    println!("  Bytes            : {}", report.bytes_transferred);
    println!("  Resend requests  : {}", report.resend_requests);
    if !report.missing_seq_nums.is_empty() {
        println!("  Missing chunks   : {:?}", report.missing_seq_nums);
    }
    println!("  Local digest     : {}", hex::encode(local_digest));
    if let Some(received) = &outcome.data {
        let match_word = if file_digest(received) == local_digest {
            "match"
        } else {
            "MISMATCH"
        };
        println!("  Round trip       : {match_word}");
    }
}

fn cmd_digest(file: &str) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("failed to read file: {file}"))?;
    println!("{}  {}", hex::encode(file_digest(&data)), file);
    Ok(())
}

fn print_usage() {
    println!("Usage: ferry-ctl [--addr <host:port>] <command>");
    println!();
    println!("Commands:");
    println!("  send <file>     Upload a file and receive it back as verified chunks");
    println!("  digest <file>   Print the BLAKE3 digest of a local file");
    println!();
    println!("Options:");
    println!("  --addr <host:port>   Daemon address (default: {DEFAULT_ADDR})");
    println!("  --output <path>      Write the received copy to this path");
    println!("  --json               Print the transfer report as JSON");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut addr = DEFAULT_ADDR.to_string();
    let mut output: Option<PathBuf> = None;
    let mut json = false;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" => {
                i += 1;
                addr = args.get(i).context("--addr requires a value")?.clone();
            }
            "--output" => {
                i += 1;
                output = Some(PathBuf::from(
                    args.get(i).context("--output requires a value")?,
                ));
            }
            "--json" => json = true,
            arg => remaining.push(arg),
        }
        i += 1;
    }
    match remaining.as_slice() {
        ["send", file] => cmd_send(&addr, file, output.as_deref(), json).await,
        ["digest", file] => cmd_digest(file),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
