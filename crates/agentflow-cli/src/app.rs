use agentflow_core::presets::{content_marketing_crew, content_marketing_graph};
use agentflow_core::{
    OrchestrationPolicy, Orchestrator, RunRequest, RunResult, Settings, StepRecord,
};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run_graph(settings: &Settings, request: &str) -> Result<()> {
    let llm = settings.build_llm_client()?;
    let tools = settings.build_tool_registry();
    let graph = content_marketing_graph(llm, &tools, &settings.orchestration)?;
    let result = drive(settings, Arc::new(graph), RunRequest::new(request)).await?;
    print_final(&result);
    Ok(())
}

pub async fn run_crew(settings: &Settings, topic: &str) -> Result<()> {
    let llm = settings.build_llm_client()?;
    let tools = settings.build_tool_registry();
    let crew = content_marketing_crew(llm, &tools, &settings.orchestration)?;
    let result = drive(settings, Arc::new(crew), RunRequest::topic(topic)).await?;
    print_final(&result);
    Ok(())
}

pub fn init_config(settings: &Settings, path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(Settings::config_path);
    if path.exists() {
        println!("{} already exists", path.display());
    } else {
        settings
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// Run to completion, printing each step as it lands. Ctrl-C cancels at the
/// next decision boundary.
async fn drive(
    settings: &Settings,
    policy: Arc<dyn OrchestrationPolicy>,
    request: RunRequest,
) -> Result<RunResult> {
    let orchestrator = Orchestrator::new(policy).with_ceiling(settings.orchestration.ceiling);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n[cancelling after the current step]");
                cancel.cancel();
            }
        }
    });

    let mut execution = orchestrator
        .start(request.with_cancellation(cancel))
        .await?;
    let mut failure = None;
    while let Some(step) = execution.next_step().await {
        match step {
            Ok(step) => println!("{}\n\n-----------------------------\n", format_step(&step)),
            Err(e) => failure = Some(e),
        }
    }
    watcher.abort();

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(execution.finish().await?),
    }
}

fn format_step(step: &StepRecord) -> String {
    let mut line = format!("[{}] {}", step.index + 1, step.agent);
    if let Some(ref task) = step.task {
        line.push_str(&format!(" ({task})"));
    }
    line.push_str(": ");
    line.push_str(step.output.trim());
    if step.failed_tool_calls > 0 {
        line.push_str(&format!("\n[{} tool call(s) failed]", step.failed_tool_calls));
    }
    line
}

fn print_final(result: &RunResult) {
    match result.final_output {
        Some(ref output) => println!("Final output:\n\n{output}"),
        None => println!("The run finished without any agent acting."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, task: Option<&str>, failed_tool_calls: usize) -> StepRecord {
        StepRecord {
            index,
            agent: "blog_manager".to_string(),
            task: task.map(str::to_string),
            prompt: None,
            output: "  # Lifting heavy\n".to_string(),
            failed_tool_calls,
            completed_at: Default::default(),
        }
    }

    #[test]
    fn test_format_graph_step() {
        assert_eq!(format_step(&step(0, None, 0)), "[1] blog_manager: # Lifting heavy");
    }

    #[test]
    fn test_format_task_step_with_failures() {
        let line = format_step(&step(1, Some("blog"), 2));
        assert!(line.starts_with("[2] blog_manager (blog): # Lifting heavy"));
        assert!(line.ends_with("[2 tool call(s) failed]"));
    }
}
