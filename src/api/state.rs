//! Application state for the Incentive Engine API.

use std::sync::Arc;

use crate::service::IncentiveService;

/// Shared application state.
///
/// Every handler works through the same [`IncentiveService`].
#[derive(Clone)]
pub struct AppState {
    service: Arc<IncentiveService>,
}

impl AppState {
    /// Creates a new application state over the given service.
    pub fn new(service: Arc<IncentiveService>) -> Self {
        Self { service }
    }

    /// Returns the incentive service.
    pub fn service(&self) -> &IncentiveService {
        &self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
