//! The fixed binary layout used for `BlockQueueBlocks` keys/values.
//!
//! Kept deliberately simple (no RLP, no codegen) since the only reader of this layout is this
//! crate itself; wire-level block encoding belongs to the eth-wire layer, not here.

use crate::{StorageError, StorageResult};
use alloy_primitives::B256;
use chainsync_primitives::BlockWrapper;

const VALUE_LEN: usize = 32 + 32 + 1 + 8;

/// Encodes a block number as a big-endian 8-byte key, so lexicographic key order matches
/// numeric order and the store's native cursor iteration can be used directly for `index`.
pub(crate) fn encode_number_key(number: u64) -> [u8; 8] {
    number.to_be_bytes()
}

pub(crate) fn decode_number_key(key: &[u8]) -> StorageResult<u64> {
    let arr: [u8; 8] =
        key.try_into().map_err(|_| StorageError::Corrupt { key: key.to_vec(), reason: "block key is not 8 bytes" })?;
    Ok(u64::from_be_bytes(arr))
}

pub(crate) fn encode_block(block: &BlockWrapper) -> Vec<u8> {
    let mut buf = Vec::with_capacity(VALUE_LEN);
    buf.extend_from_slice(block.hash.as_slice());
    buf.extend_from_slice(block.parent_hash.as_slice());
    buf.push(block.is_new_block as u8);
    buf.extend_from_slice(&block.received_at_ms().to_be_bytes());
    buf
}

pub(crate) fn decode_block(number: u64, key: &[u8], value: &[u8]) -> StorageResult<BlockWrapper> {
    if value.len() != VALUE_LEN {
        return Err(StorageError::Corrupt { key: key.to_vec(), reason: "unexpected block value length" });
    }
    let hash = B256::from_slice(&value[0..32]);
    let parent_hash = B256::from_slice(&value[32..64]);
    let is_new_block = value[64] != 0;
    let received_at_ms = u64::from_be_bytes(value[65..73].try_into().expect("length checked above"));
    Ok(BlockWrapper::with_received_at_ms(number, hash, parent_hash, is_new_block, received_at_ms))
}
