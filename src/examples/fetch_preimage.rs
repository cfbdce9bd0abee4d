use preimage_oracle::*;
use std::net::TcpStream;
use std::process;
use tracing_subscriber::EnvFilter;

fn parse_key(arg: &str) -> anyhow::Result<PreimageKey> {
    let bytes = hex::decode(arg.trim_start_matches("0x"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("key must be 32 bytes, got {}", b.len()))?;
    Ok(PreimageKey::from_bytes(bytes))
}

fn run(config: &OracleConfig, key: PreimageKey) -> Result<Preimage> {
    let oracle = TcpStream::connect("127.0.0.1:7070")?;
    let hints = TcpStream::connect("127.0.0.1:7071")?;

    let io = CachingOracle::new(OracleIo::new(
        config.client(oracle),
        config.hint_writer(hints),
    ));

    let boot = BootInfo::load(&io)?;
    println!("Claim block: {}", boot.l2_claim_block_number);

    let hint = Hint::new("preimage", key.as_bytes().to_vec())?;
    io.hint(&hint.to_string())?;
    let value = io.get(key)?;
    tracing::debug!(cached = io.len(), "fetched");
    Ok(value)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let key = match std::env::args().nth(1) {
        Some(arg) => parse_key(&arg)?,
        None => PreimageKey::keccak256(b"hello preimage oracle"),
    };
    let config = match std::env::args().nth(2) {
        Some(path) => OracleConfig::load(path)?,
        None => OracleConfig::default(),
    };

    match run(&config, key) {
        Ok(value) => {
            println!("{key} => {} bytes", value.len());
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        Err(err) if err.is_fatal() => {
            tracing::error!(%err, "oracle fault");
            process::exit(err.exit_code());
        }
        Err(err) => Err(err.into()),
    }
}
