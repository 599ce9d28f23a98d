/// Anti-abuse gate for anonymous users.
///
/// Anonymous users get one search; after that, searching requires a login.
#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    logged_in: bool,
    anonymous_searches: u32,
}

impl SessionGate {
    pub fn new(logged_in: bool) -> Self {
        Self {
            logged_in,
            anonymous_searches: 0,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn set_logged_in(&mut self, logged_in: bool) {
        self.logged_in = logged_in;
    }

    /// Admits a search and counts it. Returns false if the user must log in.
    pub fn admit_search(&mut self) -> bool {
        if self.logged_in {
            return true;
        }
        if self.anonymous_searches > 0 {
            return false;
        }
        self.anonymous_searches += 1;
        true
    }
}
