//! Bootstrap inputs read from the local-key slots before any content is fetched.

use crate::error::{OracleError, Result};
use crate::host::MemoryStore;
use crate::key::PreimageKey;
use crate::Oracle;

pub const L1_HEAD_LOCAL_INDEX: u64 = 1;
pub const L2_OUTPUT_ROOT_LOCAL_INDEX: u64 = 2;
pub const L2_CLAIM_LOCAL_INDEX: u64 = 3;
pub const L2_CLAIM_BLOCK_NUMBER_LOCAL_INDEX: u64 = 4;
pub const L2_CHAIN_ID_LOCAL_INDEX: u64 = 5;
pub const L2_CHAIN_CONFIG_LOCAL_INDEX: u64 = 6;
pub const ROLLUP_CONFIG_LOCAL_INDEX: u64 = 7;

/// Inputs a verification run starts from.
///
/// The two configs stay opaque JSON; interpreting them belongs to the
/// derivation layer.
#[derive(Clone, Debug, PartialEq)]
pub struct BootInfo {
    pub l1_head: [u8; 32],
    pub l2_output_root: [u8; 32],
    pub l2_claim: [u8; 32],
    pub l2_claim_block_number: u64,
    pub l2_chain_id: u64,
    pub l2_chain_config: serde_json::Value,
    pub rollup_config: serde_json::Value,
}

fn hash_slot<O: Oracle + ?Sized>(oracle: &O, index: u64, name: &str) -> Result<[u8; 32]> {
    let value = oracle.get(PreimageKey::local(index))?;
    <[u8; 32]>::try_from(&*value)
        .map_err(|_| OracleError::Boot(format!("{name} is {} bytes, want 32", value.len())))
}

fn u64_slot<O: Oracle + ?Sized>(oracle: &O, index: u64, name: &str) -> Result<u64> {
    let value = oracle.get(PreimageKey::local(index))?;
    let bytes = <[u8; 8]>::try_from(&*value)
        .map_err(|_| OracleError::Boot(format!("{name} is {} bytes, want 8", value.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

fn json_slot<O: Oracle + ?Sized>(oracle: &O, index: u64, name: &str) -> Result<serde_json::Value> {
    let value = oracle.get(PreimageKey::local(index))?;
    serde_json::from_slice(&value).map_err(|e| OracleError::Boot(format!("{name}: {e}")))
}

impl BootInfo {
    pub fn load<O: Oracle + ?Sized>(oracle: &O) -> Result<Self> {
        let info = Self {
            l1_head: hash_slot(oracle, L1_HEAD_LOCAL_INDEX, "l1 head")?,
            l2_output_root: hash_slot(oracle, L2_OUTPUT_ROOT_LOCAL_INDEX, "l2 output root")?,
            l2_claim: hash_slot(oracle, L2_CLAIM_LOCAL_INDEX, "l2 claim")?,
            l2_claim_block_number: u64_slot(
                oracle,
                L2_CLAIM_BLOCK_NUMBER_LOCAL_INDEX,
                "l2 claim block number",
            )?,
            l2_chain_id: u64_slot(oracle, L2_CHAIN_ID_LOCAL_INDEX, "l2 chain id")?,
            l2_chain_config: json_slot(oracle, L2_CHAIN_CONFIG_LOCAL_INDEX, "l2 chain config")?,
            rollup_config: json_slot(oracle, ROLLUP_CONFIG_LOCAL_INDEX, "rollup config")?,
        };
        tracing::info!(
            l1_head = %hex::encode(info.l1_head),
            l2_claim = %hex::encode(info.l2_claim),
            l2_claim_block_number = info.l2_claim_block_number,
            l2_chain_id = info.l2_chain_id,
            "bootstrapped"
        );
        Ok(info)
    }

    /// Publishes the boot slots into a host store.
    pub fn stage(&self, store: &mut MemoryStore) {
        store.insert_local(L1_HEAD_LOCAL_INDEX, self.l1_head.to_vec());
        store.insert_local(L2_OUTPUT_ROOT_LOCAL_INDEX, self.l2_output_root.to_vec());
        store.insert_local(L2_CLAIM_LOCAL_INDEX, self.l2_claim.to_vec());
        store.insert_local(
            L2_CLAIM_BLOCK_NUMBER_LOCAL_INDEX,
            self.l2_claim_block_number.to_be_bytes().to_vec(),
        );
        store.insert_local(L2_CHAIN_ID_LOCAL_INDEX, self.l2_chain_id.to_be_bytes().to_vec());
        store.insert_local(
            L2_CHAIN_CONFIG_LOCAL_INDEX,
            self.l2_chain_config.to_string().into_bytes(),
        );
        store.insert_local(
            ROLLUP_CONFIG_LOCAL_INDEX,
            self.rollup_config.to_string().into_bytes(),
        );
    }
}
