//! NONE: deliberately do nothing.

use async_trait::async_trait;
use mindloop_core::action::{Action, ActionResult, HandlerContext};
use mindloop_core::error::ComponentError;

pub struct NoneAction;

#[async_trait]
impl Action for NoneAction {
    fn name(&self) -> &str {
        "NONE"
    }

    fn similes(&self) -> &[&str] {
        &["NO_ACTION", "IGNORE", "SKIP"]
    }

    fn description(&self) -> &str {
        "Take no action. Use when the message needs no response."
    }

    async fn handle(&self, _ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError> {
        Ok(ActionResult::success(self.name()))
    }
}
