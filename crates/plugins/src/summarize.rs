//! SUMMARIZE: condense what earlier plan steps produced.

use async_trait::async_trait;
use mindloop_core::action::{Action, ActionResult, HandlerContext};
use mindloop_core::error::ComponentError;
use mindloop_core::message::Content;

pub struct SummarizeAction;

#[async_trait]
impl Action for SummarizeAction {
    fn name(&self) -> &str {
        "SUMMARIZE"
    }

    fn similes(&self) -> &[&str] {
        &["SUMMARY", "RECAP"]
    }

    fn description(&self) -> &str {
        "Summarize the results of earlier steps in this plan. Option `of` limits it to one action."
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError> {
        let lines: Vec<String> = match ctx.options.get("of").and_then(|v| v.as_str()) {
            Some(action) => ctx
                .plan
                .get_previous_result(action)
                .and_then(|r| r.text.clone())
                .into_iter()
                .collect(),
            None => ctx
                .plan
                .previous_results()
                .iter()
                .filter_map(|r| r.text.clone())
                .collect(),
        };

        if lines.is_empty() {
            return Err(ComponentError::failed("nothing to summarize"));
        }

        let summary = if lines.len() == 1 {
            format!("Summary: {}", lines[0])
        } else {
            format!("Summary:\n- {}", lines.join("\n- "))
        };

        ctx.sink
            .emit(
                Content::text(summary.clone())
                    .with_action(self.name())
                    .in_reply_to(ctx.message.id.clone()),
            )
            .await?;

        Ok(ActionResult::success(self.name())
            .with_text(summary)
            .with_value("summarizedSteps", lines.len()))
    }
}
