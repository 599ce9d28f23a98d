use tokio_util::sync::CancellationToken;

/// Monotonic generation number of a map job.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(pub u64);

/// Permission for one poll loop to touch shared state.
///
/// A lease stays valid until the owning [`JobEpochs`] begins a new job or is
/// invalidated; after that every check against it fails and its token is
/// cancelled so sleeping loops wake up and exit.
#[derive(Debug, Clone)]
pub struct JobLease {
    epoch: Epoch,
    token: CancellationToken,
}

impl JobLease {
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the lease has been revoked.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Issues and revokes job leases.
#[derive(Debug, Default)]
pub struct JobEpochs {
    current: Epoch,
    token: Option<CancellationToken>,
}

impl JobEpochs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Epoch {
        self.current
    }

    /// Revoke the running lease (if any) and issue a fresh one.
    pub fn begin(&mut self) -> JobLease {
        self.invalidate();
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        JobLease {
            epoch: self.current,
            token,
        }
    }

    /// Revoke the running lease without starting a new job.
    pub fn invalidate(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.current = Epoch(self.current.0 + 1);
    }

    pub fn is_current(&self, lease: &JobLease) -> bool {
        self.token.is_some() && lease.epoch == self.current && !lease.token.is_cancelled()
    }
}
