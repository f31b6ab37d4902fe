//! [MODULE K support] Schedule traces: the exact sequence of scheduling
//! choices that produced one iteration, recorded so a reported bug can be
//! replayed deterministically (spec §4.K "a replayable schedule trace").
//!
//! Encoded by hand rather than through `serde`/`bincode` -- this is a
//! small, fixed-shape record and the wire format only ever needs to round
//! trip within this crate, so a manual little-endian layout keeps the
//! on-disk trace free of any serializer's own framing.

use weave_common::error::TestError;

/// One iteration's replayable choice sequence: the PRNG seed that fed the
/// exploration strategy, the strategy's own id (so a trace recorded under
/// one strategy is never silently replayed under another), and the
/// sequence of scheduling decisions it made -- operation indices for
/// `next_operation`, or raw integers for `next_int`/`next_bool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTrace {
    pub seed: u64,
    pub strategy_id: String,
    pub choices: Vec<u64>,
}

const MAGIC: u32 = 0x5745_4156; // "WEAV"

impl ScheduleTrace {
    pub fn new(seed: u64, strategy_id: impl Into<String>) -> Self {
        ScheduleTrace { seed, strategy_id: strategy_id.into(), choices: Vec::new() }
    }

    pub fn push_choice(&mut self, choice: u64) {
        self.choices.push(choice);
    }

    /// Layout: magic(u32) | seed(u64) | strategy_id len(u32) + bytes |
    /// choice count(u32) + choices(u64 each), all little-endian.
    pub fn encode(&self) -> Vec<u8> {
        let id_bytes = self.strategy_id.as_bytes();
        let mut buf = Vec::with_capacity(4 + 8 + 4 + id_bytes.len() + 4 + self.choices.len() * 8);
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.seed.to_le_bytes());
        buf.extend_from_slice(&(id_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(id_bytes);
        buf.extend_from_slice(&(self.choices.len() as u32).to_le_bytes());
        for choice in &self.choices {
            buf.extend_from_slice(&choice.to_le_bytes());
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TestError> {
        let mut cursor = Cursor::new(bytes);
        let magic = cursor.take_u32()?;
        if magic != MAGIC {
            return Err(TestError::misuse("schedule trace has an unrecognized magic number"));
        }
        let seed = cursor.take_u64()?;
        let id_len = cursor.take_u32()? as usize;
        let strategy_id = cursor.take_str(id_len)?;
        let choice_count = cursor.take_u32()? as usize;
        let mut choices = Vec::with_capacity(choice_count);
        for _ in 0..choice_count {
            choices.push(cursor.take_u64()?);
        }
        Ok(ScheduleTrace { seed, strategy_id, choices })
    }
}

/// Reconstruct a trace from disk and hand it to `replay_with`, which
/// drives one iteration under a replaying strategy built from
/// `seed`/`strategy_id`/`choices` (spec §6, §7 "replay the reported bug
/// deterministically"). Kept generic over the replay closure so this
/// crate never has to depend back on `weave-core`'s `Scheduler`.
pub fn replay<T>(bytes: &[u8], replay_with: impl FnOnce(&ScheduleTrace) -> T) -> Result<T, TestError> {
    let trace = ScheduleTrace::decode(bytes)?;
    Ok(replay_with(&trace))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TestError> {
        if self.pos + n > self.bytes.len() {
            return Err(TestError::misuse("schedule trace truncated"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u32(&mut self) -> Result<u32, TestError> {
        let slice = self.take(4)?;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    }

    fn take_u64(&mut self) -> Result<u64, TestError> {
        let slice = self.take(8)?;
        Ok(u64::from_le_bytes(slice.try_into().unwrap()))
    }

    fn take_str(&mut self, len: usize) -> Result<String, TestError> {
        let slice = self.take(len)?;
        String::from_utf8(slice.to_vec()).map_err(|_| TestError::misuse("schedule trace has invalid utf-8 strategy id"))
    }
}
