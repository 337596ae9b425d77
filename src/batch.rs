use crate::error::{Result, SubflowError};
use crate::subtitle::Replica;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// A contiguous, non-empty run of replicas sent to the oracle in one call
#[derive(Debug, Clone, Copy)]
pub struct Batch<'p, 'a> {
    /// 1-based position of the batch in its plan
    pub number: usize,
    pub replicas: &'p [Replica<'a>],
}

impl<'p, 'a> Batch<'p, 'a> {
    /// Oracle input: the replicas' source text back to back
    pub fn text(&self) -> String {
        self.replicas.iter().map(|r| r.text).collect()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

/// Order-preserving split of a replica sequence into fixed-size batches
#[derive(Debug, Clone)]
pub struct BatchPlan<'p, 'a> {
    replicas: &'p [Replica<'a>],
    batch_size: usize,
}

impl<'p, 'a> BatchPlan<'p, 'a> {
    pub fn new(replicas: &'p [Replica<'a>], batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(SubflowError::InvalidParams("batchSize must be at least 1".to_string()));
        }
        Ok(Self { replicas, batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn total_replicas(&self) -> usize {
        self.replicas.len()
    }

    pub fn batch_count(&self) -> usize {
        self.replicas.len().div_ceil(self.batch_size)
    }

    pub fn batches(&self) -> impl Iterator<Item = Batch<'p, 'a>> + '_ {
        self.replicas
            .chunks(self.batch_size)
            .enumerate()
            .map(|(idx, replicas)| Batch { number: idx + 1, replicas })
    }
}
