/// Outcome of asking for a refresh.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// No refresh was pending; the caller must schedule one.
    Schedule,
    /// A refresh is already pending; any continuation was chained onto it.
    AlreadyPending,
}

/// At most one pending refresh, with chained continuations.
///
/// Requests made while a refresh is pending are swallowed, but their
/// continuations are kept and handed back when the pending refresh completes,
/// so every continuation runs at least once.
#[derive(Debug)]
pub struct RefreshSlot<C> {
    scheduled: bool,
    continuations: Vec<C>,
}

impl<C> Default for RefreshSlot<C> {
    fn default() -> Self {
        Self {
            scheduled: false,
            continuations: Vec::new(),
        }
    }
}

impl<C> RefreshSlot<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn pending_continuations(&self) -> usize {
        self.continuations.len()
    }

    pub fn request(&mut self, continuation: Option<C>) -> ScheduleDecision {
        if let Some(c) = continuation {
            self.continuations.push(c);
        }
        if self.scheduled {
            return ScheduleDecision::AlreadyPending;
        }
        self.scheduled = true;
        ScheduleDecision::Schedule
    }

    /// Mark the pending refresh as done and take its continuations.
    pub fn complete(&mut self) -> Vec<C> {
        self.scheduled = false;
        std::mem::take(&mut self.continuations)
    }

    /// Hands back continuations of a refresh that failed. They run before
    /// any chained since, with the next refresh.
    pub fn requeue(&mut self, mut continuations: Vec<C>) -> ScheduleDecision {
        continuations.append(&mut self.continuations);
        self.continuations = continuations;
        self.request(None)
    }

    /// Forget the pending refresh, dropping its continuations.
    pub fn clear(&mut self) {
        self.scheduled = false;
        self.continuations.clear();
    }
}
