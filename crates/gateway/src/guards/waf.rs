//! Attack-signature stage.

use forgegate_core::SecurityEventKind;
use forgegate_security::PatternLibrary;
use std::sync::Arc;

use super::{Guard, GuardContext, GuardOutcome, Rejection};
use crate::request::GuardRequest;

pub struct WafGuard {
    library: Arc<PatternLibrary>,
}

impl WafGuard {
    pub fn new(library: Arc<PatternLibrary>) -> Self {
        Self { library }
    }
}

impl Guard for WafGuard {
    fn name(&self) -> &'static str {
        "waf"
    }

    fn check(&self, request: &GuardRequest, _ctx: &mut GuardContext) -> GuardOutcome {
        match self.library.scan(&request.scan_buffer()) {
            Some(hit) => GuardOutcome::Reject(Rejection::forbidden(SecurityEventKind::WafBlocked {
                category: hit.category,
                pattern: hit.pattern.to_string(),
            })),
            None => GuardOutcome::Continue,
        }
    }
}
