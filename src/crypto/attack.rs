//! Byte-at-a-time recovery of the hidden suffix behind a deterministic ECB encryption oracle.
//!
//! The attack only ever calls [`EncryptionOracle::query`]. It runs in four phases, each one
//! parameterizing the next:
//!
//! 1. **Unchanged prefix.** Probes that differ in a single byte diverge no later than the end of
//!    the block holding that byte. The last diverging index plus one is the count `U` of leading
//!    output bytes that attacker input can reach.
//! 2. **Block size.** With the first `U` output bytes dropped, `B` is the smallest filler length
//!    `i` for which `i` extra filler bytes shift the output by exactly `i` bytes. `U` must be a
//!    multiple of `B`, and the first `U / B - 1` blocks are pure prefix.
//! 3. **Alignment.** Within the one block shared by prefix and input, the fill length `f` is the
//!    smallest amount of filler that completes the block. It is found when an extra filler byte
//!    and a marker byte in position `f` give the same block.
//! 4. **Recovery.** With `f` filler bytes in front and the prefix blocks skipped, the oracle
//!    behaves as `ECB(input || suffix)`. Each suffix byte is the last byte of a block whose other
//!    `B - 1` bytes are known, so 256 candidates are enough to reproduce it.
//!
//! Phase 1 uses two probes by default. Their outputs collide on the last byte of the diverging
//! block about once in 256 oracles. That understates `U`, and calibration then fails with a
//! [`CalibrationError`] rather than going on with bad parameters. Every extra probe divides
//! that rate by 256.

use std::fmt;

use tracing::{debug, instrument, trace};

use super::oracle::EncryptionOracle;
use crate::{
    error::{CalibrationError, Error, Result},
    hex::hex_encode,
};

const FILLER: u8 = b'A';
const MARKER: u8 = b'B';
const PADDING_INDICATOR: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    UnchangedPrefix,
    BlockSize,
    Alignment,
    Recovery,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::UnchangedPrefix => "unchanged prefix detection",
            Phase::BlockSize => "block size detection",
            Phase::Alignment => "prefix alignment",
            Phase::Recovery => "suffix recovery",
        };
        f.write_str(name)
    }
}

/// How phase 4 decides the suffix is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Termination {
    /// Measure the suffix length up front and recover exactly that many bytes.
    #[default]
    ExactLength,
    /// Stop at the first recovered `0x01` in the final block, taking it for padding. A suffix
    /// with a genuine `0x01` in its final block gets cut short.
    PaddingHeuristic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackConfig {
    /// Largest block size phase 2 tries before giving up.
    pub block_size_ceiling: usize,
    /// Distinct single-byte probes compared in phase 1. At least 2.
    pub divergence_probes: usize,
    pub termination: Termination,
    /// Total oracle queries allowed for the run, unbounded if `None`.
    pub max_queries: Option<usize>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        AttackConfig {
            block_size_ceiling: 64,
            divergence_probes: 2,
            termination: Termination::ExactLength,
            max_queries: None,
        }
    }
}

impl AttackConfig {
    #[must_use]
    pub fn with_block_size_ceiling(mut self, ceiling: usize) -> Self {
        self.block_size_ceiling = ceiling;
        self
    }

    /// # Panics
    ///
    /// If `probes` is less than 2 or more than 256.
    #[must_use]
    pub fn with_divergence_probes(mut self, probes: usize) -> Self {
        assert!(
            (2..=256).contains(&probes),
            "divergence probes must be in 2..=256, got {probes}"
        );
        self.divergence_probes = probes;
        self
    }

    #[must_use]
    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    #[must_use]
    pub fn with_max_queries(mut self, max_queries: usize) -> Self {
        self.max_queries = Some(max_queries);
        self
    }
}

/// What phases 1-3 learned about the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    /// Leading output bytes that a one-byte input can never change (`U`).
    pub unchanged_len: usize,
    pub block_size: usize,
    /// Leading blocks made up entirely of hidden prefix.
    pub clean_prefix_blocks: usize,
    /// Filler bytes needed to complete the block the prefix spills into.
    pub fill_len: usize,
}

impl Calibration {
    /// Output bytes to drop so that nothing of the prefix remains.
    pub fn skip_len(&self) -> usize {
        let partial_block = usize::from(self.fill_len > 0);
        (self.clean_prefix_blocks + partial_block) * self.block_size
    }
}

/// A single attack run against one oracle. Owns its query count and nothing else; the oracle is
/// only ever queried.
pub struct OracleAttack<O> {
    oracle: O,
    config: AttackConfig,
    queries: usize,
    phase: Phase,
}

impl<O: EncryptionOracle> OracleAttack<O> {
    pub fn new(oracle: O) -> Self {
        Self::with_config(oracle, AttackConfig::default())
    }

    pub fn with_config(oracle: O, config: AttackConfig) -> Self {
        OracleAttack {
            oracle,
            config,
            queries: 0,
            phase: Phase::UnchangedPrefix,
        }
    }

    /// Oracle queries made so far.
    pub fn queries(&self) -> usize {
        self.queries
    }

    /// Calibrate, confirm the oracle is ECB, and recover the hidden suffix.
    ///
    /// # Errors
    ///
    /// [`CalibrationError`] if the oracle's parameters cannot be derived or it is not ECB,
    /// [`Error::Recovery`] if no candidate reproduces a target block, and any error from the
    /// oracle itself.
    pub fn run(mut self) -> Result<Vec<u8>> {
        let calibration = self.calibrate()?;
        self.ensure_ecb(&calibration)?;
        let recovered = self.recover(&calibration)?;
        debug!(
            recovered = recovered.len(),
            queries = self.queries,
            "attack finished"
        );
        Ok(recovered)
    }

    /// Phases 1 and 2 only.
    ///
    /// # Errors
    ///
    /// See [`OracleAttack::calibrate`].
    pub fn block_size(&mut self) -> Result<usize> {
        let unchanged_len = self.find_unchanged_len()?;
        self.find_block_size(unchanged_len)
    }

    /// Phases 1 through 3.
    ///
    /// # Errors
    ///
    /// [`CalibrationError`] if the output ignores the input, no block size is found under the
    /// ceiling, or the unchanged prefix is not a whole number of blocks.
    pub fn calibrate(&mut self) -> Result<Calibration> {
        let unchanged_len = self.find_unchanged_len()?;
        let block_size = self.find_block_size(unchanged_len)?;

        if unchanged_len % block_size != 0 {
            return Err(CalibrationError::MisalignedPrefix {
                unchanged: unchanged_len,
                block_size,
            }
            .into());
        }
        let clean_prefix_blocks = unchanged_len / block_size - 1;
        let fill_len = self.find_fill_len(block_size, clean_prefix_blocks)?;

        let calibration = Calibration {
            unchanged_len,
            block_size,
            clean_prefix_blocks,
            fill_len,
        };
        debug!(?calibration, queries = self.queries, "calibrated");
        Ok(calibration)
    }

    fn query(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if let Some(limit) = self.config.max_queries {
            if self.queries >= limit {
                return Err(Error::QueryBudgetExhausted {
                    phase: self.phase,
                    limit,
                });
            }
        }
        self.queries += 1;
        self.oracle.query(input)
    }

    /// The oracle with the prefix neutralized: `f` filler bytes in front, prefix blocks dropped.
    fn query_clean(&mut self, calibration: &Calibration, input: &[u8]) -> Result<Vec<u8>> {
        let mut filled = vec![FILLER; calibration.fill_len];
        filled.extend_from_slice(input);
        let mut output = self.query(&filled)?;
        Ok(output.split_off(calibration.skip_len().min(output.len())))
    }

    #[allow(clippy::cast_possible_truncation)]
    #[instrument(skip(self), level = "debug")]
    fn find_unchanged_len(&mut self) -> Result<usize> {
        self.phase = Phase::UnchangedPrefix;

        let reference = self.query(&[FILLER])?;
        let mut last_divergence = None;
        for probe in (1..self.config.divergence_probes).map(|i| FILLER.wrapping_add(i as u8)) {
            let output = self.query(&[probe])?;
            let shorter = reference.len().min(output.len());
            let diverged = reference
                .iter()
                .zip(&output)
                .rposition(|(a, b)| a != b)
                // different lengths diverge at the shorter end
                .or_else(|| (reference.len() != output.len()).then_some(shorter));
            last_divergence = last_divergence.max(diverged);
        }

        let unchanged_len = last_divergence.ok_or(CalibrationError::NoDivergence)? + 1;
        debug!(unchanged_len, "found unchanged prefix");
        Ok(unchanged_len)
    }

    #[instrument(skip(self), level = "debug")]
    fn find_block_size(&mut self, unchanged_len: usize) -> Result<usize> {
        self.phase = Phase::BlockSize;

        let base = self.query(&[])?;
        let base = base
            .get(unchanged_len..)
            .ok_or(CalibrationError::NoDivergence)?;

        for i in 1..=self.config.block_size_ceiling {
            let output = self.query(&vec![FILLER; i])?;
            if output.get(unchanged_len + i..) == Some(base) {
                debug!(block_size = i, "found block size");
                return Ok(i);
            }
        }

        Err(CalibrationError::BlockSizeNotFound {
            ceiling: self.config.block_size_ceiling,
        }
        .into())
    }

    #[instrument(skip(self), level = "debug")]
    fn find_fill_len(&mut self, block_size: usize, clean_prefix_blocks: usize) -> Result<usize> {
        self.phase = Phase::Alignment;
        let window = clean_prefix_blocks * block_size..(clean_prefix_blocks + 1) * block_size;

        for fill_len in 0..block_size {
            let filled = self.query(&vec![FILLER; fill_len + 1])?;
            let mut marked = vec![FILLER; fill_len];
            marked.push(MARKER);
            let marked = self.query(&marked)?;

            let filled_block = filled.get(window.clone());
            if filled_block.is_some() && filled_block == marked.get(window.clone()) {
                debug!(fill_len, "found fill length");
                return Ok(fill_len);
            }
        }

        // no fill ever completes the block: the prefix already ends on a boundary
        debug!(fill_len = 0, "prefix is block aligned");
        Ok(0)
    }

    /// Two blocks of filler must encrypt to two identical blocks. Anything else (say, CBC with a
    /// fresh IV per query) breaks the determinism phase 4 depends on.
    fn ensure_ecb(&mut self, calibration: &Calibration) -> Result<()> {
        let block_size = calibration.block_size;
        let output = self.query_clean(calibration, &vec![FILLER; 2 * block_size])?;
        match (output.get(..block_size), output.get(block_size..2 * block_size)) {
            (Some(first), Some(second)) if first == second => Ok(()),
            _ => Err(CalibrationError::NotEcb.into()),
        }
    }

    /// Measure the suffix: the clean output grows by a block once `n` filler bytes plus the
    /// suffix fill a whole number of blocks, at which point `len(suffix) = len(clean(∅)) - n`.
    #[instrument(skip(self), level = "debug")]
    fn find_suffix_len(&mut self, calibration: &Calibration) -> Result<usize> {
        let base_len = self.query_clean(calibration, &[])?.len();

        for filler_len in 1..=calibration.block_size {
            let len = self.query_clean(calibration, &vec![FILLER; filler_len])?.len();
            if len > base_len {
                let suffix_len = base_len
                    .checked_sub(filler_len)
                    .ok_or(CalibrationError::SuffixLengthNotFound)?;
                debug!(suffix_len, "found suffix length");
                return Ok(suffix_len);
            }
        }

        Err(CalibrationError::SuffixLengthNotFound.into())
    }

    #[instrument(skip(self), level = "debug")]
    fn recover(&mut self, calibration: &Calibration) -> Result<Vec<u8>> {
        self.phase = Phase::Recovery;
        let block_size = calibration.block_size;

        let suffix_len = match self.config.termination {
            Termination::ExactLength => Some(self.find_suffix_len(calibration)?),
            Termination::PaddingHeuristic => None,
        };
        let block_count = self.query_clean(calibration, &[])?.len() / block_size;

        // targets[i] puts the suffix byte at position `i` of each block into that block's last
        // slot. The oracle is deterministic, so every block can share these.
        let targets = (0..block_size)
            .map(|position| {
                self.query_clean(calibration, &vec![FILLER; block_size - 1 - position])
            })
            .collect::<Result<Vec<_>>>()?;

        let mut recovered = Vec::with_capacity(suffix_len.unwrap_or(block_count * block_size));
        loop {
            if suffix_len.is_some_and(|len| recovered.len() >= len) {
                break;
            }

            let (block, position) = (recovered.len() / block_size, recovered.len() % block_size);
            if block >= block_count {
                break;
            }

            let byte = self.recover_byte(calibration, &targets[position], &recovered)?;
            trace!(block, position, byte, "recovered byte");

            if suffix_len.is_none() && byte == PADDING_INDICATOR && block + 1 == block_count {
                debug!(block, position, "hit padding");
                break;
            }
            recovered.push(byte);
        }

        Ok(recovered)
    }

    /// Find the byte that, appended to the `B - 1` bytes preceding it, encrypts to the target
    /// block.
    fn recover_byte(
        &mut self,
        calibration: &Calibration,
        target: &[u8],
        recovered: &[u8],
    ) -> Result<u8> {
        let block_size = calibration.block_size;
        let (block, position) = (recovered.len() / block_size, recovered.len() % block_size);
        let target_block = target
            .get(block * block_size..(block + 1) * block_size)
            .ok_or(Error::Recovery { block, position })?;
        trace!(block, position, expected = %hex_encode(target_block, false), "searching");

        // the same B - 1 bytes that precede the unknown byte in the target block
        let mut window = vec![FILLER; block_size - 1];
        window.extend_from_slice(recovered);
        let mut window = window.split_off(window.len() - (block_size - 1));
        window.push(0);

        for candidate in 0..=u8::MAX {
            window[block_size - 1] = candidate;
            let output = self.query_clean(calibration, &window)?;
            if output.get(..block_size) == Some(target_block) {
                return Ok(candidate);
            }
        }

        Err(Error::Recovery { block, position })
    }
}
