//! Deterministic partitioning of a labeled dataset into client shards.

use crate::core::{Error, Result};
use crate::dataset::LabeledDataset;
use crate::federated::noniid::{DataDistribution, NonIIDAnalyzer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

/// One simulated participant's slice of the training data.
#[derive(Clone, Debug)]
pub struct ClientShard {
    /// 1-based client id
    pub id: usize,
    /// Rows owned by this client
    pub data: LabeledDataset,
    /// Label distribution of the rows
    pub distribution: DataDistribution,
}

impl ClientShard {
    /// Number of rows in the shard.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the shard holds no rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Shuffles once with a fixed seed and cuts contiguous slices.
#[derive(Clone, Debug)]
pub struct DataPartitioner {
    n_clients: usize,
    seed: u64,
}

impl DataPartitioner {
    /// Create a partitioner for `n_clients` shards.
    pub fn new(n_clients: usize, seed: u64) -> Self {
        Self { n_clients, seed }
    }

    /// Split `data` into shards. Every row lands in exactly one shard; the
    /// remainder of the integer division goes to the last shard.
    pub fn partition(&self, data: &LabeledDataset) -> Result<Vec<ClientShard>> {
        if self.n_clients == 0 {
            return Err(Error::InvalidConfig("number of clients must be at least 1".into()));
        }
        if self.n_clients > data.len() {
            return Err(Error::InvalidConfig(format!(
                "cannot split {} rows across {} clients",
                data.len(),
                self.n_clients
            )));
        }

        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        let analyzer = NonIIDAnalyzer::new(data.label_counts().positive_rate());
        let chunk = data.len() / self.n_clients;

        let shards: Vec<ClientShard> = (0..self.n_clients)
            .map(|i| {
                let start = i * chunk;
                let end = if i + 1 == self.n_clients {
                    data.len()
                } else {
                    start + chunk
                };
                let rows = data.subset(&order[start..end]);
                ClientShard {
                    id: i + 1,
                    distribution: analyzer.analyze(&rows),
                    data: rows,
                }
            })
            .collect();

        for shard in &shards {
            info!(
                client = shard.id,
                rows = shard.len(),
                positive_rate = shard.distribution.positive_rate,
                "created client shard"
            );
        }
        Ok(shards)
    }
}

/// Partition with an ad-hoc partitioner.
pub fn partition(data: &LabeledDataset, n: usize, seed: u64) -> Result<Vec<ClientShard>> {
    DataPartitioner::new(n, seed).partition(data)
}
