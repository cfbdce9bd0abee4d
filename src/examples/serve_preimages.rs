use preimage_oracle::*;
use serde_json::json;
use std::net::TcpListener;
use std::thread;
use tracing_subscriber::EnvFilter;

const ORACLE_ADDR: &str = "127.0.0.1:7070";
const HINT_ADDR: &str = "127.0.0.1:7071";

fn demo_store() -> MemoryStore {
    let mut store = MemoryStore::default();
    let boot = BootInfo {
        l1_head: keccak256(b"l1 head"),
        l2_output_root: keccak256(b"l2 output root"),
        l2_claim: keccak256(b"l2 claim"),
        l2_claim_block_number: 1024,
        l2_chain_id: 901,
        l2_chain_config: json!({ "chainId": 901 }),
        rollup_config: json!({ "block_time": 2, "l2_chain_id": 901 }),
    };
    boot.stage(&mut store);

    let key = store.insert(b"hello preimage oracle".to_vec());
    println!("Staged demo preimage under {}", key);
    store
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => OracleConfig::load(path)?,
        None => OracleConfig::default(),
    };
    let store = demo_store();

    let hints = TcpListener::bind(HINT_ADDR)?;
    let hint_config = config.clone();
    thread::spawn(move || {
        for stream in hints.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(%err, "hint accept failed");
                    continue;
                }
            };
            let mut reader = hint_config.hint_reader(stream);
            thread::spawn(move || {
                let mut log_hint = |hint: &str| {
                    match hint.parse::<Hint>() {
                        Ok(hint) => tracing::info!(route = hint.route(), "hint"),
                        Err(_) => tracing::info!(hint, "raw hint"),
                    }
                    Ok::<_, OracleError>(())
                };
                if let Err(err) = reader.serve(&mut log_hint) {
                    tracing::warn!(%err, "hint channel closed with error");
                }
            });
        }
    });

    let listener = TcpListener::bind(ORACLE_ADDR)?;
    println!("Serving preimages on {ORACLE_ADDR}, hints on {HINT_ADDR}");

    for stream in listener.incoming() {
        let stream = stream?;
        let peer = stream.peer_addr()?;
        let store = store.clone();
        let config = config.clone();
        thread::spawn(move || {
            let mut getter = RecordingGetter::new(store);
            let mut server = config.server(stream);
            match server.serve(&mut getter) {
                Ok(()) => tracing::info!(%peer, served = getter.served().len(), "client finished"),
                Err(err) => tracing::error!(%peer, %err, "dropping client"),
            }
        });
    }

    Ok(())
}
