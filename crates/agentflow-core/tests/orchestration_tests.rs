use agentflow_core::{
    Agent, AgentGraph, AgentInput, AgentOutput, Author, Crew, ErrorKind, FlowError,
    InMemorySessionStore, Orchestrator, RouteStrategy, RunRequest, SessionStore, TaskSpec, Turn,
    FINISH,
};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

type Reply = Box<dyn Fn(&AgentInput<'_>) -> Result<AgentOutput, FlowError> + Send + Sync>;

/// Agent whose output is computed from its input, recording what it saw.
struct StubAgent {
    id: String,
    reply: Reply,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl StubAgent {
    fn new(
        id: &str,
        reply: impl Fn(&AgentInput<'_>) -> Result<AgentOutput, FlowError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            reply: Box::new(reply),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn fixed(id: &str, output: &str) -> Arc<Self> {
        let output = output.to_string();
        Self::new(id, move |_| Ok(AgentOutput::text(output.clone())))
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn seen(&self) -> Vec<Vec<Turn>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Agent for StubAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&self, input: AgentInput<'_>) -> Result<AgentOutput, FlowError> {
        self.seen.lock().unwrap().push(input.messages.to_vec());
        (self.reply)(&input)
    }
}

/// Router strategy that plays back a script, then answers FINISH.
struct ScriptedStrategy {
    answers: Mutex<VecDeque<Result<String, FlowError>>>,
    calls: AtomicUsize,
    corrections: Mutex<Vec<Option<String>>>,
}

impl ScriptedStrategy {
    fn new(answers: &[&str]) -> Arc<Self> {
        Self::with_results(answers.iter().map(|a| Ok(a.to_string())).collect())
    }

    fn with_results(answers: Vec<Result<String, FlowError>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
            corrections: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RouteStrategy for ScriptedStrategy {
    async fn propose(
        &self,
        _history: &[Turn],
        _options: &[String],
        correction: Option<&str>,
    ) -> Result<String, FlowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.corrections
            .lock()
            .unwrap()
            .push(correction.map(str::to_string));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FINISH.to_string()))
    }
}

/// Always returns the same raw value.
struct ConstantStrategy {
    raw: &'static str,
    calls: AtomicUsize,
}

impl ConstantStrategy {
    fn new(raw: &'static str) -> Arc<Self> {
        Arc::new(Self {
            raw,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RouteStrategy for ConstantStrategy {
    async fn propose(&self, _: &[Turn], _: &[String], _: Option<&str>) -> Result<String, FlowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.raw.to_string())
    }
}

/// Sends the request to `a1`, then finishes.
struct OneShotStrategy;

#[async_trait::async_trait]
impl RouteStrategy for OneShotStrategy {
    async fn propose(&self, history: &[Turn], _: &[String], _: Option<&str>) -> Result<String, FlowError> {
        match history.last().map(|t| &t.author) {
            Some(Author::User) => Ok("a1".to_string()),
            _ => Ok(FINISH.to_string()),
        }
    }
}

fn graph(strategy: Arc<dyn RouteStrategy>, agents: &[Arc<StubAgent>]) -> Orchestrator {
    let policy = AgentGraph::builder(strategy)
        .agents(agents.iter().map(|a| a.clone() as Arc<dyn Agent>))
        .build()
        .unwrap();
    Orchestrator::new(Arc::new(policy))
}

/// The part of a task prompt that came from upstream tasks.
fn upstream(prompt: &str) -> &str {
    prompt
        .split("This is the context you're working with:\n")
        .nth(1)
        .unwrap_or("")
}

fn last_content(input: &AgentInput<'_>) -> String {
    input.messages.last().map(|t| t.content.clone()).unwrap_or_default()
}

fn content_crew() -> (Crew, Vec<Arc<StubAgent>>) {
    let researcher = StubAgent::fixed("online_researcher", "R");
    let blog = StubAgent::new("blog_manager", |input| {
        Ok(AgentOutput::text(format!("B({})", upstream(&last_content(input)))))
    });
    let social = StubAgent::new("social_media_manager", |input| {
        Ok(AgentOutput::text(format!("T({})", upstream(&last_content(input)))))
    });

    let crew = Crew::builder()
        .agent(researcher.clone())
        .agent(blog.clone())
        .agent(social.clone())
        .task(
            TaskSpec::new("research", "online_researcher", "Conduct in-depth research on '{topic}'.")
                .with_expected_output("A summary of '{topic}'."),
        )
        .task(
            TaskSpec::new("blog", "blog_manager", "Write a blog article about '{topic}'.")
                .with_context(["research"]),
        )
        .task(
            TaskSpec::new("tweet", "social_media_manager", "Write a tweet about '{topic}'.")
                .with_context(["blog"]),
        )
        .build()
        .unwrap();
    (crew, vec![researcher, blog, social])
}

// ── Router-driven runs ──────────────────────────────────────────────────

#[tokio::test]
async fn test_graph_runs_scripted_team_to_finish() {
    let researcher = StubAgent::fixed("online_researcher", "research notes");
    let blog = StubAgent::fixed("blog_manager", "a blog post");
    let social = StubAgent::fixed("social_media_manager", "a tweet");
    let strategy = ScriptedStrategy::new(&[
        "online_researcher",
        "blog_manager",
        "social_media_manager",
        "FINISH",
    ]);
    let orchestrator = graph(strategy.clone(), &[researcher, blog, social]);

    let result = orchestrator
        .run(RunRequest::new(
            "Write me a report of 100 words on the benefits of lifting heavy weights",
        ))
        .await
        .unwrap();

    let agents: Vec<&str> = result.steps.iter().map(|s| s.agent.as_str()).collect();
    assert_eq!(agents, vec!["online_researcher", "blog_manager", "social_media_manager"]);
    assert_eq!(result.final_output.as_deref(), Some("a tweet"));
    assert_eq!(result.messages.len(), 4);
    assert_eq!(result.messages[0].author, Author::User);
    assert_eq!(strategy.calls(), 4);
    assert!(result.steps.iter().enumerate().all(|(i, s)| s.index == i));
}

#[tokio::test]
async fn test_graph_two_steps_then_finish() {
    let a1 = StubAgent::fixed("a1", "one");
    let a2 = StubAgent::fixed("a2", "two");
    let orchestrator = graph(ScriptedStrategy::new(&["a1", "a2", "FINISH"]), &[a1.clone(), a2.clone()]);

    let result = orchestrator.run(RunRequest::new("go")).await.unwrap();

    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.steps[0].agent, "a1");
    assert_eq!(result.steps[1].agent, "a2");
    assert_eq!(a1.calls(), 1);
    assert_eq!(a2.calls(), 1);
}

#[tokio::test]
async fn test_graph_agents_see_whole_conversation() {
    let a1 = StubAgent::fixed("a1", "first");
    let a2 = StubAgent::fixed("a2", "second");
    let orchestrator = graph(ScriptedStrategy::new(&["a1", "a2"]), &[a1.clone(), a2.clone()]);

    orchestrator.run(RunRequest::new("request")).await.unwrap();

    let seen = a2.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 2);
    assert_eq!(seen[0][0], Turn::user("request"));
    assert_eq!(seen[0][1], Turn::agent("a1", "first"));
}

#[tokio::test]
async fn test_immediate_finish_has_no_output() {
    let a1 = StubAgent::fixed("a1", "unused");
    let orchestrator = graph(ScriptedStrategy::new(&["FINISH"]), &[a1.clone()]);

    let result = orchestrator.run(RunRequest::new("nothing to do")).await.unwrap();

    assert!(result.steps.is_empty());
    assert!(result.final_output.is_none());
    assert_eq!(result.messages, vec![Turn::user("nothing to do")]);
    assert_eq!(a1.calls(), 0);
}

#[tokio::test]
async fn test_decorated_router_answers_are_accepted() {
    let a1 = StubAgent::fixed("a1", "done");
    let strategy = ScriptedStrategy::new(&["  \"A1\"  ", "'finish'"]);
    let orchestrator = graph(strategy.clone(), &[a1]);

    let result = orchestrator.run(RunRequest::new("go")).await.unwrap();
    assert_eq!(result.steps.len(), 1);
    assert_eq!(strategy.calls(), 2);
}

#[tokio::test]
async fn test_invalid_router_answer_retried_once_then_fails() {
    let a1 = StubAgent::fixed("a1", "unused");
    let strategy = ScriptedStrategy::new(&["the blog manager, probably", "{\"next\": null}"]);
    let orchestrator = graph(strategy.clone(), &[a1.clone()]);

    let err = orchestrator.run(RunRequest::new("go")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Routing);
    assert_eq!(strategy.calls(), 2);
    let corrections = strategy.corrections.lock().unwrap().clone();
    assert!(corrections[0].is_none());
    assert!(corrections[1].as_deref().is_some_and(|c| c.contains("a1")));
    assert!(err.steps.is_empty());
    assert_eq!(a1.calls(), 0);
}

#[tokio::test]
async fn test_malformed_router_output_never_reaches_an_agent() {
    let garbage = ["", "   ", "a1 a1", "FINISHED", "null", "a 1", "🤖", "blog_manager"];
    for raw in garbage {
        let a1 = StubAgent::fixed("a1", "unused");
        let strategy = ConstantStrategy::new(raw);
        let orchestrator = graph(strategy.clone(), &[a1.clone()]);

        let err = orchestrator.run(RunRequest::new("go")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing, "raw value {raw:?}");
        assert_eq!(strategy.calls(), 2, "raw value {raw:?}");
        assert_eq!(a1.calls(), 0);
    }
}

#[tokio::test]
async fn test_corrected_router_answer_continues_run() {
    let a1 = StubAgent::fixed("a1", "done");
    let strategy = ScriptedStrategy::new(&["nobody", "a1", "FINISH"]);
    let orchestrator = graph(strategy.clone(), &[a1]);

    let result = orchestrator.run(RunRequest::new("go")).await.unwrap();
    assert_eq!(result.steps.len(), 1);
    assert_eq!(strategy.calls(), 3);
}

#[tokio::test]
async fn test_router_model_error_is_not_retried() {
    let a1 = StubAgent::fixed("a1", "unused");
    let strategy = ScriptedStrategy::with_results(vec![Err(FlowError::Model("rate limited".into()))]);
    let orchestrator = graph(strategy.clone(), &[a1]);

    let err = orchestrator.run(RunRequest::new("go")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Model);
    assert_eq!(strategy.calls(), 1);
}

#[tokio::test]
async fn test_ceiling_stops_run_with_partial_history() {
    let a1 = StubAgent::fixed("a1", "again");
    let orchestrator = graph(ConstantStrategy::new("a1"), &[a1.clone()]);

    let err = orchestrator
        .run(RunRequest::new("loop forever").with_ceiling(3))
        .await
        .unwrap_err();

    assert!(matches!(err.error, FlowError::CeilingExceeded(3)));
    assert_eq!(err.steps.len(), 3);
    assert_eq!(err.messages.len(), 4);
    assert_eq!(a1.calls(), 3);
}

#[tokio::test]
async fn test_ceiling_counts_finish_decision() {
    let fits = graph(ScriptedStrategy::new(&["a1", "FINISH"]), &[StubAgent::fixed("a1", "x")]);
    assert!(fits.run(RunRequest::new("go").with_ceiling(2)).await.is_ok());

    let too_small = graph(ScriptedStrategy::new(&["a1", "FINISH"]), &[StubAgent::fixed("a1", "x")]);
    let err = too_small
        .run(RunRequest::new("go").with_ceiling(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CeilingExceeded);
    assert_eq!(err.steps.len(), 1);
}

#[tokio::test]
async fn test_orchestrator_default_ceiling_applies() {
    let orchestrator = graph(ConstantStrategy::new("a1"), &[StubAgent::fixed("a1", "x")]).with_ceiling(5);
    let err = orchestrator.run(RunRequest::new("go")).await.unwrap_err();
    assert!(matches!(err.error, FlowError::CeilingExceeded(5)));
    assert_eq!(err.steps.len(), 5);
}

#[tokio::test]
async fn test_zero_ceiling_is_configuration_error() {
    let a1 = StubAgent::fixed("a1", "x");
    let orchestrator = graph(ScriptedStrategy::new(&["a1"]), &[a1.clone()]);
    let err = orchestrator
        .run(RunRequest::new("go").with_ceiling(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(a1.calls(), 0);
}

#[tokio::test]
async fn test_agent_model_failure_aborts_run() {
    let a1 = StubAgent::fixed("a1", "fine");
    let a2 = StubAgent::new("a2", |_| Err(FlowError::Model("agent 'a2': upstream 500".into())));
    let orchestrator = graph(ScriptedStrategy::new(&["a1", "a2", "a1"]), &[a1.clone(), a2]);

    let err = orchestrator.run(RunRequest::new("go")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Model);
    assert_eq!(err.steps.len(), 1);
    assert_eq!(err.messages.len(), 2);
    assert_eq!(a1.calls(), 1);
}

#[tokio::test]
async fn test_graph_build_rejects_bad_rosters() {
    let empty = AgentGraph::builder(ConstantStrategy::new("FINISH")).build();
    assert!(matches!(empty, Err(FlowError::Configuration(_))));

    let duplicate = AgentGraph::builder(ConstantStrategy::new("FINISH"))
        .agent(StubAgent::fixed("a1", "x"))
        .agent(StubAgent::fixed("A1", "y"))
        .build();
    assert!(matches!(duplicate, Err(FlowError::Configuration(_))));

    let reserved = AgentGraph::builder(ConstantStrategy::new("FINISH"))
        .agent(StubAgent::fixed("finish", "x"))
        .build();
    assert!(matches!(reserved, Err(FlowError::Configuration(_))));
}

#[tokio::test]
async fn test_graph_build_rejects_ids_the_router_cannot_echo() {
    for id in ["v2.", "'quoted'", " padded", "two words", "a1`"] {
        let built = AgentGraph::builder(ConstantStrategy::new(id))
            .agent(StubAgent::fixed(id, "x"))
            .build();
        assert!(matches!(built, Err(FlowError::Configuration(_))), "id {id:?}");
    }
}

#[tokio::test]
async fn test_hyphenated_id_is_routable() {
    let agent = StubAgent::fixed("v2-writer_1", "drafted");
    let orchestrator = graph(ScriptedStrategy::new(&["v2-writer_1", "FINISH"]), &[agent.clone()]);

    let result = orchestrator.run(RunRequest::new("go")).await.unwrap();
    assert_eq!(result.final_output.as_deref(), Some("drafted"));
    assert_eq!(agent.calls(), 1);
}

#[tokio::test]
async fn test_messages_only_grow() {
    let orchestrator = graph(
        ScriptedStrategy::new(&["a1", "a2", "a1", "FINISH"]),
        &[StubAgent::fixed("a1", "one"), StubAgent::fixed("a2", "two")],
    );

    let mut execution = orchestrator.start(RunRequest::new("go")).await.unwrap();
    let mut previous: Vec<Turn> = execution.state().messages().to_vec();
    while let Some(step) = execution.next_step().await {
        let step = step.unwrap();
        let current = execution.state().messages();
        assert_eq!(current.len(), previous.len() + 1);
        assert_eq!(&current[..previous.len()], previous.as_slice());
        assert_eq!(current.last().map(|t| t.content.as_str()), Some(step.output.as_str()));
        previous = current.to_vec();
    }
    assert!(execution.state().is_terminal());
    assert!(execution.next_step().await.is_none());
}

#[tokio::test]
async fn test_execution_streams_steps_lazily() {
    let a1 = StubAgent::fixed("a1", "one");
    let a2 = StubAgent::fixed("a2", "two");
    let orchestrator = graph(ScriptedStrategy::new(&["a1", "a2", "FINISH"]), &[a1.clone(), a2.clone()]);

    let execution = orchestrator.start(RunRequest::new("go")).await.unwrap();
    assert_eq!(a1.calls(), 0);

    let mut stream = Box::pin(execution.into_stream());
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.agent, "a1");
    assert_eq!(a2.calls(), 0);

    let rest: Vec<_> = stream.collect().await;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].as_ref().unwrap().agent, "a2");
}

#[tokio::test]
async fn test_stream_ends_with_failure() {
    let orchestrator = graph(ConstantStrategy::new("a1"), &[StubAgent::fixed("a1", "x")]);
    let execution = orchestrator
        .start(RunRequest::new("go").with_ceiling(2))
        .await
        .unwrap();

    let items: Vec<_> = execution.into_stream().collect().await;
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    let err = items[2].as_ref().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CeilingExceeded);
    assert_eq!(err.steps.len(), 2);
}

#[tokio::test]
async fn test_cancellation_returns_partial_history() {
    let token = CancellationToken::new();
    let cancel_from_agent = token.clone();
    let a1 = StubAgent::new("a1", move |_| {
        cancel_from_agent.cancel();
        Ok(AgentOutput::text("partial"))
    });
    let orchestrator = graph(ConstantStrategy::new("a1"), &[a1.clone()]);

    let err = orchestrator
        .run(RunRequest::new("go").with_cancellation(token))
        .await
        .unwrap_err();

    assert!(matches!(err.error, FlowError::Cancelled));
    assert_eq!(err.steps.len(), 1);
    assert_eq!(err.messages.last(), Some(&Turn::agent("a1", "partial")));
    assert_eq!(a1.calls(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_takes_no_step() {
    let token = CancellationToken::new();
    token.cancel();
    let a1 = StubAgent::fixed("a1", "x");
    let orchestrator = graph(ConstantStrategy::new("a1"), &[a1.clone()]);

    let err = orchestrator
        .run(RunRequest::new("go").with_cancellation(token))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(err.steps.is_empty());
    assert_eq!(a1.calls(), 0);
}

#[tokio::test]
async fn test_session_history_carries_into_next_run() {
    let store = Arc::new(InMemorySessionStore::new());
    let a1 = StubAgent::new("a1", |input| Ok(AgentOutput::text(format!("saw {}", input.messages.len()))));
    let orchestrator = graph(Arc::new(OneShotStrategy), &[a1.clone()]).with_session_store(store.clone());

    let first = orchestrator
        .run(RunRequest::new("first").with_session("s1"))
        .await
        .unwrap();
    assert_eq!(first.final_output.as_deref(), Some("saw 1"));

    let second = orchestrator
        .run(RunRequest::new("second").with_session("s1"))
        .await
        .unwrap();
    assert_eq!(second.final_output.as_deref(), Some("saw 3"));
    assert_eq!(second.messages[0], Turn::user("first"));
    assert_eq!(second.messages[2], Turn::user("second"));

    assert_eq!(store.load("s1").await.unwrap().len(), 4);
    assert!(store.load("other").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_run_does_not_update_session() {
    let store = Arc::new(InMemorySessionStore::new());
    let orchestrator = graph(ConstantStrategy::new("a1"), &[StubAgent::fixed("a1", "x")])
        .with_session_store(store.clone());

    let err = orchestrator
        .run(RunRequest::new("go").with_session("s").with_ceiling(2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CeilingExceeded);
    assert!(store.load("s").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let a1 = StubAgent::new("a1", |input| Ok(AgentOutput::text(format!("re: {}", last_content(input)))));
    let orchestrator = Arc::new(graph(Arc::new(OneShotStrategy), &[a1]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run(RunRequest::new(format!("request {i}"))).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.messages.len(), 2);
        assert_eq!(result.final_output, Some(format!("re: request {i}")));
    }
}

// ── Sequential runs ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_task_returns_agent_output_verbatim() {
    let writer = StubAgent::fixed("writer", "  exactly this\n");
    let crew = Crew::builder()
        .agent(writer.clone())
        .task(TaskSpec::new("only", "writer", "Write about {topic}."))
        .build()
        .unwrap();

    let result = Orchestrator::new(Arc::new(crew))
        .run(RunRequest::topic("heavy weights"))
        .await
        .unwrap();

    assert_eq!(result.final_output.as_deref(), Some("  exactly this\n"));
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].prompt.as_deref(), Some("Write about heavy weights."));
    assert_eq!(writer.calls(), 1);
}

#[tokio::test]
async fn test_crew_chains_task_outputs() {
    let (crew, agents) = content_crew();
    let orchestrator = Orchestrator::new(Arc::new(crew));

    let result = orchestrator
        .run(RunRequest::topic("the benefits of lifting heavy weights"))
        .await
        .unwrap();

    assert_eq!(result.task_output("research"), Some("R"));
    assert_eq!(result.task_output("blog"), Some("B(R)"));
    assert_eq!(result.task_output("tweet"), Some("T(B(R))"));
    assert_eq!(result.final_output.as_deref(), Some("T(B(R))"));

    let tweet_prompt = result.steps[2].prompt.as_deref().unwrap();
    assert!(tweet_prompt.contains("B(R)"));
    assert!(tweet_prompt.starts_with("Write a tweet about 'the benefits of lifting heavy weights'."));

    let research_prompt = result.steps[0].prompt.as_deref().unwrap();
    assert!(research_prompt.contains("expected criteria for your final answer: A summary of"));
    assert!(!research_prompt.contains("context you're working with"));

    assert!(agents.iter().all(|a| a.calls() == 1));
    assert_eq!(agents[1].seen()[0].len(), 1);
}

#[tokio::test]
async fn test_crew_runs_in_dependency_order() {
    let writer = StubAgent::new("writer", |input| Ok(AgentOutput::text(format!("[{}]", upstream(&last_content(input))))));
    let crew = Crew::builder()
        .agent(writer.clone())
        .task(TaskSpec::new("c", "writer", "third").with_context(["a", "b"]))
        .task(TaskSpec::new("b", "writer", "second").with_context(["a"]))
        .task(TaskSpec::new("a", "writer", "first"))
        .build()
        .unwrap();
    assert_eq!(crew.execution_order(), vec!["a", "b", "c"]);

    let result = Orchestrator::new(Arc::new(crew))
        .run(RunRequest::new("go"))
        .await
        .unwrap();

    let tasks: Vec<&str> = result.steps.iter().filter_map(|s| s.task.as_deref()).collect();
    assert_eq!(tasks, vec!["a", "b", "c"]);
    assert_eq!(result.task_output("b"), Some("[[]]"));
    assert_eq!(result.task_output("c"), Some("[[]\n\n----------\n\n[[]]]"));
}

#[tokio::test]
async fn test_crew_missing_template_param_fails_before_any_step() {
    let (crew, agents) = content_crew();
    let orchestrator = Orchestrator::new(Arc::new(crew));

    let err = orchestrator.run(RunRequest::new("no topic")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("topic"));
    assert!(err.steps.is_empty());
    assert!(agents.iter().all(|a| a.calls() == 0));
}

#[tokio::test]
async fn test_crew_ceiling_counts_task_advances() {
    let (crew, _) = content_crew();
    let orchestrator = Orchestrator::new(Arc::new(crew));
    assert!(orchestrator
        .run(RunRequest::topic("t").with_ceiling(3))
        .await
        .is_ok());

    let err = orchestrator
        .run(RunRequest::topic("t").with_ceiling(2))
        .await
        .unwrap_err();
    assert!(matches!(err.error, FlowError::CeilingExceeded(2)));
    assert_eq!(err.steps.len(), 2);
}

#[tokio::test]
async fn test_crew_tool_error_from_agent_aborts() {
    let failing = StubAgent::new("a", |_| Err(FlowError::tool("web_search", "blocked")));
    let crew = Crew::builder()
        .agent(failing)
        .task(TaskSpec::new("t", "a", "do it"))
        .build()
        .unwrap();

    let err = Orchestrator::new(Arc::new(crew))
        .run(RunRequest::new("go"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Tool);
}

#[test]
fn test_crew_build_rejects_bad_graphs() {
    let agent = || StubAgent::fixed("a", "x") as Arc<dyn Agent>;

    let cycle = Crew::builder()
        .agent(agent())
        .task(TaskSpec::new("x", "a", "x").with_context(["y"]))
        .task(TaskSpec::new("y", "a", "y").with_context(["x"]))
        .build();
    assert!(matches!(cycle, Err(FlowError::Configuration(_))));

    let dangling = Crew::builder()
        .agent(agent())
        .task(TaskSpec::new("x", "a", "x").with_context(["missing"]))
        .build();
    assert!(matches!(dangling, Err(FlowError::Configuration(_))));

    let unknown_agent = Crew::builder()
        .agent(agent())
        .task(TaskSpec::new("x", "nobody", "x"))
        .build();
    assert!(matches!(unknown_agent, Err(FlowError::Configuration(_))));

    let duplicate_task = Crew::builder()
        .agent(agent())
        .task(TaskSpec::new("x", "a", "x"))
        .task(TaskSpec::new("x", "a", "again"))
        .build();
    assert!(matches!(duplicate_task, Err(FlowError::Configuration(_))));

    let self_reference = Crew::builder()
        .agent(agent())
        .task(TaskSpec::new("x", "a", "x").with_context(["x"]))
        .build();
    assert!(matches!(self_reference, Err(FlowError::Configuration(_))));

    assert!(matches!(Crew::builder().agent(agent()).build(), Err(FlowError::Configuration(_))));
}
