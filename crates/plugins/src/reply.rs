//! REPLY: send text back to whoever wrote the message.

use async_trait::async_trait;
use mindloop_core::action::{Action, ActionExample, ActionResult, HandlerContext};
use mindloop_core::error::ComponentError;
use mindloop_core::message::Content;

pub struct ReplyAction;

#[async_trait]
impl Action for ReplyAction {
    fn name(&self) -> &str {
        "REPLY"
    }

    fn similes(&self) -> &[&str] {
        &["RESPOND", "RESPONSE", "ANSWER"]
    }

    fn description(&self) -> &str {
        "Reply to the current message. Uses the `text` option, or the reply text chosen with the plan."
    }

    fn examples(&self) -> Vec<Vec<ActionExample>> {
        vec![vec![
            ActionExample::new("user", "Hello there!", None),
            ActionExample::new("agent", "Hi! How can I help?", Some("REPLY")),
        ]]
    }

    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<ActionResult, ComponentError> {
        let text = ctx
            .options
            .get("text")
            .and_then(|v| v.as_str())
            .or(ctx.reply)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ComponentError::InvalidOptions("no reply text available".into()))?;

        let mut content = Content::text(text)
            .with_action(self.name())
            .in_reply_to(ctx.message.id.clone());
        content.source = ctx.message.content.source.clone();
        ctx.sink.emit(content).await?;

        Ok(ActionResult::success(self.name())
            .with_text(text)
            .with_value("reply", text))
    }
}
