use crate::{scheme::Scheme, webhook::AdmissionController};
use std::sync::Arc;

pub(crate) struct ApiServerState {
    pub(crate) scheme: Arc<Scheme>,
    pub(crate) controller: AdmissionController,
}
