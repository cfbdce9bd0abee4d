use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{OracleError, Result};
use crate::hint::{HintMode, HintReader, HintWriter, DEFAULT_MAX_HINT_LEN};
use crate::wire::{LengthPrefix, OracleClient, OracleServer, DEFAULT_MAX_PREIMAGE_LEN};
use crate::word::{HostCalls, WordStreamOracle};

/// Which transport the client reaches the host through
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Stream,
    WordStream,
}

/// Per-deployment oracle settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    pub length_prefix: LengthPrefix,
    pub hint_mode: HintMode,
    pub transport: TransportKind,
    pub max_preimage_len: u64,
    pub max_hint_len: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            length_prefix: LengthPrefix::BigEndian,
            hint_mode: HintMode::Required,
            transport: TransportKind::Stream,
            max_preimage_len: DEFAULT_MAX_PREIMAGE_LEN,
            max_hint_len: DEFAULT_MAX_HINT_LEN,
        }
    }
}

impl OracleConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| OracleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| OracleError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_preimage_len == 0 {
            return Err(OracleError::Config("max_preimage_len must be non-zero".into()));
        }
        if self.max_hint_len == 0 {
            return Err(OracleError::Config("max_hint_len must be non-zero".into()));
        }
        Ok(())
    }

    pub fn client<RW: Read + Write>(&self, rw: RW) -> OracleClient<RW> {
        OracleClient::new(rw)
            .with_length_prefix(self.length_prefix)
            .with_max_len(self.max_preimage_len)
    }

    pub fn server<RW: Read + Write>(&self, rw: RW) -> OracleServer<RW> {
        OracleServer::new(rw).with_length_prefix(self.length_prefix)
    }

    pub fn hint_writer<W: Write>(&self, w: W) -> HintWriter<W> {
        HintWriter::with_mode(w, self.hint_mode)
    }

    pub fn hint_reader<R: Read>(&self, r: R) -> HintReader<R> {
        HintReader::new(r).with_max_len(self.max_hint_len)
    }

    pub fn word_oracle<H: HostCalls>(&self, host: H) -> WordStreamOracle<H> {
        WordStreamOracle::new(host).with_max_len(self.max_preimage_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = OracleConfig::from_json_str("{}").unwrap();
        assert_eq!(config, OracleConfig::default());
        assert_eq!(config.length_prefix, LengthPrefix::BigEndian);
    }

    #[test]
    fn test_parse_all_fields() {
        let config = OracleConfig::from_json_str(
            r#"{
                "length_prefix": "little_endian",
                "hint_mode": "best_effort",
                "transport": "word_stream",
                "max_preimage_len": 4096,
                "max_hint_len": 256
            }"#,
        )
        .unwrap();
        assert_eq!(config.length_prefix, LengthPrefix::LittleEndian);
        assert_eq!(config.hint_mode, HintMode::BestEffort);
        assert_eq!(config.transport, TransportKind::WordStream);
        assert_eq!(config.max_preimage_len, 4096);
        assert_eq!(config.max_hint_len, 256);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            OracleConfig::from_json_str(r#"{"length_prefix": "middle_endian"}"#),
            Err(OracleError::Config(_))
        ));
        assert!(OracleConfig::from_json_str(r#"{"unknown": 1}"#).is_err());
        assert!(OracleConfig::from_json_str(r#"{"max_preimage_len": 0}"#).is_err());
        assert!(OracleConfig::from_json_str(r#"{"max_hint_len": 0}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"hint_mode": "disabled"}}"#).unwrap();

        let config = OracleConfig::load(file.path()).unwrap();
        assert_eq!(config.hint_mode, HintMode::Disabled);
        assert!(OracleConfig::load(file.path().with_extension("missing")).is_err());
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_value(OracleConfig::default()).unwrap();
        assert_eq!(json["length_prefix"], "big_endian");
        assert_eq!(json["transport"], "stream");
    }
}
