//! Chunked batch reads with per-group sequential fallback.

use tracing::{debug, warn};

use crate::chain::{BatchAttempt, ChainReader, ReadCall, ReadOutcome};

/// Default number of calls bundled into one multicall round.
pub const DEFAULT_GROUP_SIZE: usize = 50;

/// Issues reads in bounded groups, preferring the reader's batch primitive.
///
/// Every input call yields exactly one [`ReadOutcome`], in input order. A group
/// whose batch attempt is unsupported or fails is retried one call at a time,
/// so a single bad read never takes its neighbours down with it.
pub struct ChunkedBatchReader<'a> {
    reader: &'a dyn ChainReader,
    group_size: usize,
}

impl<'a> ChunkedBatchReader<'a> {
    /// A `group_size` of zero is treated as one.
    pub fn new(reader: &'a dyn ChainReader, group_size: usize) -> Self {
        Self {
            reader,
            group_size: group_size.max(1),
        }
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Read every call, preserving order.
    pub async fn read_all(&self, calls: &[ReadCall]) -> Vec<ReadOutcome> {
        let mut outcomes = Vec::with_capacity(calls.len());

        for (index, group) in calls.chunks(self.group_size).enumerate() {
            match self.reader.batch_read(group).await {
                BatchAttempt::Completed(results) if results.len() == group.len() => {
                    outcomes.extend(results);
                }
                BatchAttempt::Completed(results) => {
                    warn!(
                        group = index,
                        expected = group.len(),
                        received = results.len(),
                        "batch returned wrong number of results, reading sequentially"
                    );
                    outcomes.extend(self.read_sequential(group).await);
                }
                BatchAttempt::Unsupported => {
                    debug!(group = index, size = group.len(), "batch reads unsupported, reading sequentially");
                    outcomes.extend(self.read_sequential(group).await);
                }
                BatchAttempt::Failed(cause) => {
                    warn!(group = index, size = group.len(), %cause, "batch read failed, reading sequentially");
                    outcomes.extend(self.read_sequential(group).await);
                }
            }
        }

        outcomes
    }

    async fn read_sequential(&self, group: &[ReadCall]) -> Vec<ReadOutcome> {
        let mut outcomes = Vec::with_capacity(group.len());
        for call in group {
            let outcome = ReadOutcome::from(self.reader.read_value(call).await);
            if let ReadOutcome::Failure(cause) = &outcome {
                debug!(operation = %call.operation, %cause, "sequential read failed");
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
