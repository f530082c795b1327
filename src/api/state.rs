use std::sync::Arc;

use crate::gateway::scheduler::AutoTradeScheduler;
use crate::gateway::Gateway;

/// Shared handle every axum extractor and handler clones out of. The
/// scheduler sits next to the gateway rather than inside it — see
/// `gateway::scheduler` for why.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub scheduler: Arc<AutoTradeScheduler>,
}
