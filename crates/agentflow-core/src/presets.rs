//! The content-marketing team: an online researcher, a blog manager and a
//! social media manager, wired either behind a router or as a task chain.

use std::sync::Arc;

use crate::agent::{Agent, AgentSpec, LlmAgent, LlmRouteStrategy, TaskSpec};
use crate::config::OrchestrationSettings;
use crate::error::FlowError;
use crate::llm::LlmClient;
use crate::orchestrator::{AgentGraph, Crew};
use crate::tools::ToolRegistry;

pub const ONLINE_RESEARCHER: &str = "online_researcher";
pub const BLOG_MANAGER: &str = "blog_manager";
pub const SOCIAL_MEDIA_MANAGER: &str = "social_media_manager";
pub const MANAGER_ROLE: &str = "a content marketing manager";

pub const RESEARCH_TASK: &str = "research";
pub const BLOG_TASK: &str = "blog";
pub const TWEET_TASK: &str = "tweet";

const WEB_TOOLS: [&str; 2] = ["web_search", "page_fetch"];

/// Agents for the router-driven team. Each one may search and fetch pages.
pub fn graph_agents() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new(
            ONLINE_RESEARCHER,
            "an online researcher tasked with gathering current info on any topic",
        )
        .with_tools(WEB_TOOLS),
        AgentSpec::new(
            BLOG_MANAGER,
            "a blog manager responsible for creating high-quality SEO blog articles",
        )
        .with_tools(WEB_TOOLS),
        AgentSpec::new(
            SOCIAL_MEDIA_MANAGER,
            "a social media manager crafting impactful tweets from blog content",
        )
        .with_tools(WEB_TOOLS),
    ]
}

/// Agents for the sequential team. Goals are filled from `{topic}`.
pub fn crew_agents() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new(ONLINE_RESEARCHER, "Online Researcher")
            .with_goal("Collect accurate, real-time information about {topic}.")
            .with_backstory(
                "You are a research specialist focused on gathering high-quality data \
                 from web sources, reports, articles, and news. Your job is to understand \
                 the core of any topic quickly and provide rich insights to support the content team. \
                 You do not guess or speculate; you find real, relevant facts to build the foundation \
                 for blogs and social media posts.",
            )
            .with_tools(WEB_TOOLS),
        AgentSpec::new(BLOG_MANAGER, "Blog Manager")
            .with_goal("Convert the research on {topic} into a structured, engaging blog post.")
            .with_backstory(
                "As a professional blog manager, you transform research data into clear, well-written blog content. \
                 You polish grammar, organize ideas with proper headers, and optimize content for readability and SEO. \
                 Your writing is audience-friendly, informative, and aligned with modern blogging best practices. \
                 The final output should be something ready to publish on a reputable blog.",
            ),
        AgentSpec::new(SOCIAL_MEDIA_MANAGER, "Social Media Manager")
            .with_goal("Craft a short, compelling tweet summarizing the blog post on {topic}.")
            .with_backstory(
                "You're a savvy social media manager who knows how to turn blog articles into bite-sized, high-engagement tweets. \
                 You distill the essence of the article into under 280 characters, using hooks, emojis, and hashtags to attract readers. \
                 Your role is to amplify the reach of content by making it shareable and exciting for Twitter/X users.",
            ),
    ]
}

/// research -> blog -> tweet, each fed the previous task's output.
pub fn crew_tasks() -> Vec<TaskSpec> {
    vec![
        TaskSpec::new(
            RESEARCH_TASK,
            ONLINE_RESEARCHER,
            "Conduct in-depth research on the topic '{topic}'.\n\
             - Find factual, current, and relevant information.\n\
             - Cover multiple angles: benefits, challenges, examples.\n\
             - Avoid repetition, and do not make up data.\n\
             - Return a clean, professional summary ready to be shaped into a blog article.",
        )
        .with_expected_output(
            "A detailed, accurate summary of the topic '{topic}', suitable for use in a blog post.",
        ),
        TaskSpec::new(
            BLOG_TASK,
            BLOG_MANAGER,
            "Based on the research summary from the Online Researcher, \
             write a high-quality blog article about '{topic}'.\n\
             - Improve clarity and structure.\n\
             - Add section headers, transitions, and a conclusion.\n\
             - Ensure it's suitable for web publication and SEO-optimized.\n\
             - Do NOT fabricate data; stick to the research provided.",
        )
        .with_expected_output(
            "A blog article (300-500 words) in markdown format with headers, intro, and conclusion.",
        )
        .with_context([RESEARCH_TASK]),
        TaskSpec::new(
            TWEET_TASK,
            SOCIAL_MEDIA_MANAGER,
            "Based on the blog article about '{topic}', write a high-engagement tweet.\n\
             - Max 280 characters.\n\
             - Use emojis and hashtags if appropriate.\n\
             - Hook the reader, but stay true to the blog's message.\n\
             - The tweet should invite curiosity or provide a powerful one-liner summary.",
        )
        .with_expected_output(
            "A concise tweet that summarizes and promotes the blog article on '{topic}'.",
        )
        .with_context([BLOG_TASK]),
    ]
}

fn build_agents(
    specs: Vec<AgentSpec>,
    llm: &Arc<dyn LlmClient>,
    tools: &ToolRegistry,
    settings: &OrchestrationSettings,
) -> Result<Vec<Arc<dyn Agent>>, FlowError> {
    specs
        .into_iter()
        .map(|spec| {
            let agent = LlmAgent::from_registry(spec, llm.clone(), tools)?
                .with_max_iterations(settings.agent_max_iterations)
                .with_tool_failure(settings.tool_failure);
            Ok(Arc::new(agent) as Arc<dyn Agent>)
        })
        .collect()
}

/// The team behind a content marketing manager that routes between them.
pub fn content_marketing_graph(
    llm: Arc<dyn LlmClient>,
    tools: &ToolRegistry,
    settings: &OrchestrationSettings,
) -> Result<AgentGraph, FlowError> {
    let agents = build_agents(graph_agents(), &llm, tools, settings)?;
    let strategy = LlmRouteStrategy::new(llm).with_manager_role(MANAGER_ROLE);
    AgentGraph::builder(Arc::new(strategy))
        .agents(agents)
        .build()
}

/// The team as a fixed research, blog, tweet pipeline.
pub fn content_marketing_crew(
    llm: Arc<dyn LlmClient>,
    tools: &ToolRegistry,
    settings: &OrchestrationSettings,
) -> Result<Crew, FlowError> {
    let mut builder = Crew::builder();
    for agent in build_agents(crew_agents(), &llm, tools, settings)? {
        builder = builder.agent(agent);
    }
    for task in crew_tasks() {
        builder = builder.task(task);
    }
    builder.build()
}
