use crate::data_sync::client::RawLog;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::VecDeque;
use tracing::info;

const WORD: usize = 32;

/// Amount recorded on the synthetic record that marks a challenge change.
pub const CHALLENGE_MARKER_AMOUNT: f64 = -1.0;

/// Where the interesting values live inside a mint log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MintLayout {
    /// Topic holding the miner address in its low 20 bytes.
    pub miner_topic_index: usize,
    /// Byte offset of the 32-byte reward amount in the data payload.
    pub amount_offset: usize,
    pub amount_decimals: u32,
    /// Byte offset of the 32-byte challenge in the data payload.
    pub challenge_offset: usize,
}

impl Default for MintLayout {
    fn default() -> Self {
        Self { miner_topic_index: 1, amount_offset: 0, amount_decimals: 18, challenge_offset: 64 }
    }
}

impl MintLayout {
    fn word(data: &[u8], offset: usize) -> Option<&[u8]> {
        data.get(offset..offset.checked_add(WORD)?)
    }

    pub fn miner(&self, log: &RawLog) -> Address {
        log.topics.get(self.miner_topic_index).map(|topic| Address::from_word(*topic)).unwrap_or(Address::ZERO)
    }

    pub fn amount(&self, data: &[u8]) -> f64 {
        match Self::word(data, self.amount_offset) {
            Some(word) => f64::from(U256::from_be_slice(word)) / 10f64.powi(self.amount_decimals as i32),
            None => 0.0,
        }
    }

    pub fn challenge(&self, data: &[u8]) -> Option<B256> {
        Self::word(data, self.challenge_offset).map(B256::from_slice)
    }
}

/// One row of the mined block list: `[blockNumber, txHash, miner, amount]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MinedEvent {
    pub block_number: u64,
    pub transaction_hash: B256,
    pub miner: Address,
    pub amount: f64,
}

impl MinedEvent {
    pub fn is_challenge_marker(&self) -> bool {
        self.amount == CHALLENGE_MARKER_AMOUNT
    }
}

impl Serialize for MinedEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.block_number, self.transaction_hash, self.miner, self.amount).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MinedEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (block_number, transaction_hash, miner, amount) = <(u64, B256, Address, f64)>::deserialize(deserializer)?;
        Ok(Self { block_number, transaction_hash, miner, amount })
    }
}

/// Newest-first list of mined events plus the last challenge seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinedEventLog {
    events: VecDeque<MinedEvent>,
    previous_challenge: Option<B256>,
}

impl MinedEventLog {
    pub fn restore(events: Vec<MinedEvent>, previous_challenge: Option<B256>) -> Self {
        Self { events: events.into(), previous_challenge }
    }

    pub fn events(&self) -> impl Iterator<Item = &MinedEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn previous_challenge(&self) -> Option<B256> {
        self.previous_challenge
    }

    /// Folds one log into the list. Logs must arrive in chain order because
    /// challenge-change detection compares against the previous log.
    ///
    /// When the challenge differs from a previously seen one, a marker row
    /// with amount `-1` is prepended first. It carries the block of the most
    /// recent stored event (the last block mined under the old challenge).
    pub fn fold(&mut self, log: &RawLog, layout: &MintLayout) {
        let miner = layout.miner(log);
        let amount = layout.amount(&log.data);

        if let Some(challenge) = layout.challenge(&log.data) {
            if self.previous_challenge != Some(challenge) {
                info!("Challenge changed: {:?} -> {}", self.previous_challenge, challenge);
                if self.previous_challenge.replace(challenge).is_some() {
                    let first_block = self.events.front().map(|e| e.block_number).unwrap_or(log.block_number);
                    self.events.push_front(MinedEvent {
                        block_number: first_block,
                        transaction_hash: log.transaction_hash,
                        miner,
                        amount: CHALLENGE_MARKER_AMOUNT,
                    });
                }
            }
        }

        self.events.push_front(MinedEvent {
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            miner,
            amount,
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    pub(crate) fn mint_log(block_number: u64, log_index: u64, reward: u64, challenge: u8) -> RawLog {
        let mut data = vec![0u8; 96];
        data[..32].copy_from_slice(&U256::from(reward).to_be_bytes::<32>());
        data[32..64].copy_from_slice(&U256::from(block_number).to_be_bytes::<32>());
        data[64..96].copy_from_slice(&[challenge; 32]);
        RawLog {
            block_number,
            log_index,
            transaction_hash: B256::repeat_byte(log_index as u8 + 1),
            topics: vec![B256::repeat_byte(0xcf), Address::repeat_byte(0x42).into_word()],
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_decodes_miner_and_amount() {
        let log = mint_log(10, 0, 50, 1);
        let layout = MintLayout { amount_decimals: 0, ..MintLayout::default() };
        assert_eq!(layout.miner(&log), Address::repeat_byte(0x42));
        assert_eq!(layout.amount(&log.data), 50.0);
        assert_eq!(layout.challenge(&log.data), Some(B256::repeat_byte(1)));
    }

    #[test]
    fn test_amount_scales_full_width_words() {
        let layout = MintLayout::default();
        let mut data = vec![0u8; 32];
        data.copy_from_slice(&U256::from(1_500_000_000_000_000_000u64).to_be_bytes::<32>());
        assert!((layout.amount(&data) - 1.5).abs() < 1e-12);

        let widest = layout.amount(&[0xff; 32]);
        assert!(widest.is_finite() && widest > 1e58);
    }

    #[test]
    fn test_short_payload_has_no_amount_or_challenge() {
        let layout = MintLayout::default();
        assert_eq!(layout.amount(&[1u8; 16]), 0.0);
        assert_eq!(layout.challenge(&[1u8; 80]), None);
    }

    #[test]
    fn test_first_challenge_emits_no_marker() {
        let mut log = MinedEventLog::default();
        log.fold(&mint_log(10, 0, 50, 1), &MintLayout::default());
        log.fold(&mint_log(11, 1, 50, 1), &MintLayout::default());

        assert_eq!(log.len(), 2);
        assert!(log.events().all(|e| !e.is_challenge_marker()));
        assert_eq!(log.previous_challenge(), Some(B256::repeat_byte(1)));
    }

    #[test]
    fn test_challenge_change_emits_one_marker() {
        let layout = MintLayout::default();
        let mut log = MinedEventLog::default();
        log.fold(&mint_log(10, 0, 50, 1), &layout);
        log.fold(&mint_log(12, 1, 50, 1), &layout);
        log.fold(&mint_log(15, 2, 50, 2), &layout);
        log.fold(&mint_log(16, 3, 50, 2), &layout);

        let events: Vec<_> = log.events().cloned().collect();
        assert_eq!(events.len(), 5);
        let markers: Vec<_> = events.iter().filter(|e| e.is_challenge_marker()).collect();
        assert_eq!(markers.len(), 1);
        // newest first: 16, 15, marker, 12, 10
        assert_eq!(events.iter().map(|e| e.block_number).collect::<Vec<_>>(), vec![16, 15, 12, 12, 10]);
        assert!(events[2].is_challenge_marker());
        assert_eq!(events[2].transaction_hash, B256::repeat_byte(3));
    }

    #[test]
    fn test_restored_challenge_is_compared_against() {
        let layout = MintLayout::default();
        let mut log = MinedEventLog::restore(Vec::new(), Some(B256::repeat_byte(9)));
        log.fold(&mint_log(20, 0, 50, 1), &layout);
        assert_eq!(log.len(), 2);
        // nothing stored yet, so the marker falls back to the current block
        assert_eq!(log.events().nth(1).map(|e| e.block_number), Some(20));
    }

    #[test]
    fn test_event_serializes_as_row() {
        let event = MinedEvent {
            block_number: 7,
            transaction_hash: B256::repeat_byte(0xaa),
            miner: Address::repeat_byte(0x11),
            amount: -1.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0], 7);
        assert_eq!(json[3], -1.0);
        let back: MinedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
