//! Tool-call dispatcher.
//!
//! Contract: every inbound call gets exactly one response on the session,
//! correlated by name (and id when present). Unknown names, handler
//! failures, timeouts, and identity gating all answer with a structured
//! error instead of silence. Each call runs in its own tracked task so a
//! blocking handler cannot stall unrelated calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use booth_core::types::{CapabilityOutput, FunctionCall, IdentityMode};
use booth_live::LiveTransport;
use booth_tools::{CapabilityContext, CapabilityRegistry};

use crate::BoothEvent;

pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    context: Arc<CapabilityContext>,
    transport: Arc<dyn LiveTransport>,
    events: mpsc::UnboundedSender<BoothEvent>,
    mode: IdentityMode,
    tool_timeout: Duration,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        context: Arc<CapabilityContext>,
        transport: Arc<dyn LiveTransport>,
        events: mpsc::UnboundedSender<BoothEvent>,
        mode: IdentityMode,
        tool_timeout: Duration,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            registry,
            context,
            transport,
            events,
            mode,
            tool_timeout,
            tracker,
        }
    }

    /// Dispatch one batch of inbound calls, one task per call.
    pub fn dispatch(&self, calls: Vec<FunctionCall>) {
        for call in calls {
            let registry = self.registry.clone();
            let context = self.context.clone();
            let transport = self.transport.clone();
            let events = self.events.clone();
            let mode = self.mode;
            let tool_timeout = self.tool_timeout;

            let _ = events.send(BoothEvent::ToolCall {
                tool: call.name.clone(),
            });

            self.tracker.spawn(async move {
                let output = execute(&registry, &context, mode, tool_timeout, &call).await;

                let _ = events.send(BoothEvent::ToolResult {
                    tool: call.name.clone(),
                    is_error: output.is_error,
                });

                if let Err(e) = transport
                    .send_tool_response(&call.name, call.id.as_deref(), &output)
                    .await
                {
                    warn!(%e, tool = %call.name, "Failed to send tool response");
                    let _ = events.send(BoothEvent::Error {
                        message: format!("response for {} not delivered: {e}", call.name),
                    });
                }
            });
        }
    }
}

/// Run one call to completion, mapping every failure to an error output.
async fn execute(
    registry: &CapabilityRegistry,
    context: &CapabilityContext,
    mode: IdentityMode,
    tool_timeout: Duration,
    call: &FunctionCall,
) -> CapabilityOutput {
    // In on-demand mode only `identifyUser` may run before identity binds.
    if mode == IdentityMode::OnDemand && !context.user.is_bound() && call.name != "identifyUser" {
        warn!(tool = %call.name, "Tool call before identification");
        return CapabilityOutput::error("no user identified yet");
    }

    let Some(capability) = registry.get(&call.name) else {
        warn!(tool = %call.name, "Unknown tool");
        return CapabilityOutput::error(format!("unknown tool: {}", call.name));
    };

    info!(tool = %call.name, "Executing tool");
    match tokio::time::timeout(tool_timeout, capability.invoke(call.args.clone(), context)).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(%e, tool = %call.name, "Tool execution error");
            CapabilityOutput::error(e.to_string())
        }
        Err(_) => {
            warn!(tool = %call.name, ?tool_timeout, "Tool timed out");
            CapabilityOutput::error(format!(
                "tool timed out after {}s",
                tool_timeout.as_secs()
            ))
        }
    }
}
