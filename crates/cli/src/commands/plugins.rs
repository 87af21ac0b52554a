//! `mindloop plugins`: Show plugins in registration order.

use std::sync::Arc;

use mindloop_config::AppConfig;
use mindloop_memory::InMemoryAdapter;
use mindloop_runtime::{AgentRuntime, PluginDescriptor, StaticInvoker};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let runtime = AgentRuntime::builder()
        .with_plugins(super::plugins_for(&config, Arc::new(InMemoryAdapter::new())))
        .with_config(config)
        .with_invoker(Arc::new(StaticInvoker::default()))
        .build()
        .await?;

    println!("Plugins (registration order)");
    println!("============================");
    for (i, plugin) in runtime.registry().plugins().iter().enumerate() {
        print!("{}", describe(i + 1, plugin));
    }
    runtime.stop().await;
    Ok(())
}

fn describe(index: usize, plugin: &PluginDescriptor) -> String {
    let mut out = format!("{index}. {}", plugin.name);
    if !plugin.description.is_empty() {
        out.push_str(&format!(" — {}", plugin.description));
    }
    out.push('\n');
    if !plugin.dependencies.is_empty() {
        out.push_str(&format!("   depends on: {}\n", plugin.dependencies.join(", ")));
    }
    for (label, names) in [
        ("actions", &plugin.actions),
        ("providers", &plugin.providers),
        ("evaluators", &plugin.evaluators),
        ("services", &plugin.services),
        ("models", &plugin.model_types),
        ("events", &plugin.event_handlers),
    ] {
        if !names.is_empty() {
            out.push_str(&format!("   {label}: {}\n", names.join(", ")));
        }
    }
    out
}
