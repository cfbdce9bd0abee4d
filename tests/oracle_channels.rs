use parking_lot::Mutex;
use preimage_oracle::*;
use serde_json::json;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

fn boot_info() -> BootInfo {
    BootInfo {
        l1_head: keccak256(b"l1"),
        l2_output_root: keccak256(b"output"),
        l2_claim: keccak256(b"claim"),
        l2_claim_block_number: 77,
        l2_chain_id: 901,
        l2_chain_config: json!({ "chainId": 901 }),
        rollup_config: json!({ "seq_window_size": 3600 }),
    }
}

fn values() -> Vec<Vec<u8>> {
    vec![
        Vec::new(),
        b"foobaraa".to_vec(),
        vec![0x5a; 135],
        vec![0xa5; 136],
        (0..1000u32).map(|i| i as u8).collect(),
    ]
}

fn staged_store() -> MemoryStore {
    let mut store = MemoryStore::default();
    boot_info().stage(&mut store);
    for value in values() {
        store.insert(value);
    }
    store
}

type ServerHandle = JoinHandle<(Result<()>, RecordingGetter<MemoryStore>)>;

fn spawn_server(config: &OracleConfig, stream: UnixStream) -> ServerHandle {
    let mut server = config.server(stream);
    thread::spawn(move || {
        let mut getter = RecordingGetter::new(staged_store());
        let result = server.serve(&mut getter);
        (result, getter)
    })
}

fn spawn_hint_reader(
    config: &OracleConfig,
    stream: UnixStream,
    seen: Arc<Mutex<Vec<String>>>,
) -> JoinHandle<Result<()>> {
    let mut reader = config.hint_reader(stream);
    thread::spawn(move || {
        reader.serve(&mut |hint: &str| {
            seen.lock().push(hint.to_string());
            Ok::<_, OracleError>(())
        })
    })
}

/// Boots, hints and fetches every staged value, returning what came back.
fn run_client<O: Oracle + Hinter>(oracle: &O) -> Vec<Vec<u8>> {
    assert_eq!(BootInfo::load(oracle).unwrap(), boot_info());
    values()
        .iter()
        .map(|value| {
            let key = PreimageKey::keccak256(value);
            let hint = Hint::new("preimage", key.as_bytes().to_vec()).unwrap();
            oracle.hint(&hint.to_string()).unwrap();
            oracle.get(key).unwrap().to_vec()
        })
        .collect()
}

#[test]
fn stream_round_trip_with_hints() {
    let config = OracleConfig::default();
    let (client_end, server_end) = UnixStream::pair().unwrap();
    let (hint_client, hint_server) = UnixStream::pair().unwrap();

    let server = spawn_server(&config, server_end);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hints = spawn_hint_reader(&config, hint_server, seen.clone());

    let oracle = CachingOracle::new(OracleIo::new(
        config.client(client_end),
        config.hint_writer(hint_client),
    ));
    assert_eq!(run_client(&oracle), values());
    // a second pass is served from the cache
    assert_eq!(run_client(&oracle), values());
    drop(oracle);

    let (result, getter) = server.join().unwrap();
    result.unwrap();
    assert_eq!(getter.served().len(), 7 + values().len());
    hints.join().unwrap().unwrap();
    assert_eq!(seen.lock().len(), 2 * values().len());
}

#[test]
fn ignored_hints_do_not_change_results() {
    let config = OracleConfig {
        hint_mode: HintMode::Disabled,
        ..OracleConfig::default()
    };
    let (client_end, server_end) = UnixStream::pair().unwrap();
    let server = spawn_server(&config, server_end);

    let oracle = OracleIo::new(config.client(client_end), NoopHinter);
    assert_eq!(run_client(&oracle), values());
    drop(oracle);
    server.join().unwrap().0.unwrap();
}

#[test]
fn little_endian_deployment() {
    let config = OracleConfig::from_json_str(r#"{"length_prefix": "little_endian"}"#).unwrap();
    let (client_end, server_end) = UnixStream::pair().unwrap();
    let server = spawn_server(&config, server_end);

    let client = config.client(client_end);
    assert_eq!(client.get(PreimageKey::keccak256(b"foobaraa")).unwrap().to_vec(), b"foobaraa");
    drop(client);
    server.join().unwrap().0.unwrap();
}

#[test]
fn truncated_response_is_fatal() {
    let (client_end, mut server_end) = UnixStream::pair().unwrap();
    let host = thread::spawn(move || {
        let mut key = [0u8; 32];
        std::io::Read::read_exact(&mut server_end, &mut key).unwrap();
        server_end.write_all(&10u64.to_be_bytes()).unwrap();
        server_end.write_all(b"abc").unwrap();
    });

    let client = OracleClient::new(client_end);
    let err = client.get(PreimageKey::keccak256(b"abcdefghij")).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.exit_code(), error::EXIT_TRANSPORT_FAULT);
    host.join().unwrap();
}

#[test]
fn missing_preimage_closes_connection() {
    let config = OracleConfig::default();
    let (client_end, server_end) = UnixStream::pair().unwrap();
    let server = spawn_server(&config, server_end);

    let client = config.client(client_end);
    let err = client.get(PreimageKey::keccak256(b"never staged")).unwrap_err();
    assert!(matches!(err, OracleError::UnexpectedEof("length prefix")));

    let (result, _) = server.join().unwrap();
    assert!(matches!(result, Err(OracleError::NotFound(_))));
}

#[test]
fn recorded_witness_replays_over_words() {
    let config = OracleConfig::default();
    let (client_end, server_end) = UnixStream::pair().unwrap();
    let server = spawn_server(&config, server_end);

    let client = config.client(client_end);
    let keys: Vec<_> = values().iter().map(|v| PreimageKey::keccak256(v)).collect();
    for key in &keys {
        client.get(*key).unwrap();
    }
    drop(client);
    let (result, getter) = server.join().unwrap();
    result.unwrap();

    let mut witness = Vec::new();
    getter.write_witness(&mut witness).unwrap();
    let host = MemoryWordHost::from_witness(witness.as_slice()).unwrap();

    let oracle = config.word_oracle(host);
    for (key, value) in keys.iter().zip(values()) {
        assert_eq!(oracle.get(*key).unwrap().to_vec(), value);
    }
    let host = oracle.into_host();
    assert_eq!(host.remaining(), 0);
    assert!(!host.failed());
}
