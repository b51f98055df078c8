use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use intel_orchestrator::orchestration::invoker::{
    INSIGHT_TOOL, INTELLIGENCE_SEARCH_TOOL, PROFILE_RESEARCH_TOOL, RESEARCH_TOOL,
};
use intel_orchestrator::{
    olog, Config, Error, IntelligenceRequest, Orchestrator, ProgressEvent, Result, ToolCall,
    ToolInvoker, ToolResult,
};

/// intel-orch - plan and simulate prospect-intelligence orchestration runs
#[derive(Parser, Debug)]
#[command(name = "intel-orch")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    INTEL_ORCH_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.intel-orchestrator/orchestrator.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Config file (defaults to ~/.intel-orchestrator/orchestrator.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Build a plan for a request and print it as JSON
    Plan(RequestArgs),

    /// Run a plan against an in-process simulated provider set
    Simulate {
        #[command(flatten)]
        request: RequestArgs,

        /// Provider that fails every call (repeatable)
        #[arg(long = "fail")]
        fail: Vec<String>,

        /// Dispatch parallel groups concurrently
        #[arg(long)]
        parallel: bool,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RequestArgs {
    /// Search criteria as a JSON object
    #[arg(long, conflicts_with = "url")]
    pub search: Option<String>,

    /// Profile URL to research (repeatable)
    #[arg(long)]
    pub url: Vec<String>,

    /// Desired number of results
    #[arg(short = 'n', long)]
    pub max_results: Option<u32>,

    /// Free-text conversation context
    #[arg(long)]
    pub context: Option<String>,
}

impl RequestArgs {
    fn to_request(&self) -> Result<IntelligenceRequest> {
        let mut request = if self.url.is_empty() {
            let criteria: Value = match &self.search {
                Some(raw) => serde_json::from_str(raw)?,
                None => json!({}),
            };
            IntelligenceRequest::search(criteria)
        } else {
            IntelligenceRequest::profiles(self.url.clone())
        };
        if let Some(n) = self.max_results {
            request = request.with_max_results(n);
        }
        if let Some(context) = &self.context {
            request = request.with_context(context);
        }
        Ok(request)
    }
}

/// Deterministic stand-in for real providers.
struct SimulatedProviders {
    failing: HashSet<String>,
}

#[async_trait]
impl ToolInvoker for SimulatedProviders {
    async fn call_tool(&self, call: ToolCall) -> Result<ToolResult> {
        if self.failing.contains(&call.provider) {
            return Err(Error::provider(&call.provider, "simulated outage"));
        }
        let payload = match call.tool_name.as_str() {
            RESEARCH_TOOL | PROFILE_RESEARCH_TOOL => {
                let n = call.arguments["maxResults"].as_u64().unwrap_or(3).min(5);
                let prospects: Vec<Value> = (1..=n)
                    .map(|i| json!({"name": format!("Prospect {}", i), "source": call.provider}))
                    .collect();
                json!({ "prospects": prospects })
            }
            INTELLIGENCE_SEARCH_TOOL => json!({
                "success": true,
                "data": { "signals": ["hiring", "funding"] }
            }),
            INSIGHT_TOOL => json!({
                "methodology": call.arguments["methodology"],
                "prospects": call.arguments["prospects"],
                "insights": ["decision maker identified", "budget cycle aligned"]
            }),
            _ => json!({ "ok": true }),
        };
        Ok(ToolResult::json(&payload))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    intel_orchestrator::log::init_with_debug(cli.debug);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Plan(args) => run_plan(&config, &args),
        Command::Simulate {
            request,
            fail,
            parallel,
        } => {
            if parallel {
                config.executor.parallel_dispatch = true;
            }
            run_simulate(&config, &request, fail)
        }
    }
}

fn run_plan(config: &Config, args: &RequestArgs) -> Result<()> {
    let invoker = Arc::new(SimulatedProviders {
        failing: HashSet::new(),
    });
    let orchestrator = Orchestrator::with_defaults(config, invoker)?;
    let plan = orchestrator.plan_execution(&args.to_request()?)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_simulate(config: &Config, args: &RequestArgs, fail: Vec<String>) -> Result<()> {
    let request = args.to_request()?;
    olog!("Simulating run, failing providers: {:?}", fail);
    let invoker = Arc::new(SimulatedProviders {
        failing: fail.into_iter().collect(),
    });
    let orchestrator = Orchestrator::with_defaults(config, invoker)?;

    let rt = tokio::runtime::Runtime::new()?;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let (outcome, analytics) = rt.block_on(async {
        let mut plan = orchestrator.plan_execution(&request)?;
        let outcome = orchestrator.execute(&mut plan, Some(&tx)).await;
        let analytics = orchestrator.agent_analytics().await;
        Ok::<_, Error>((outcome, analytics))
    })?;

    while let Ok(event) = rx.try_recv() {
        eprintln!("{}", format_event(&event));
    }

    let report = match outcome {
        Ok(outcome) => {
            let status = if outcome.cancelled {
                "cancelled"
            } else {
                "completed"
            };
            json!({
                "status": status,
                "metrics": outcome.metrics,
                "intelligence": outcome.intelligence,
                "analytics": analytics,
            })
        }
        Err(e) => json!({
            "status": "failed",
            "error": e.to_string(),
            "metrics": e.partial().map(|p| &p.metrics),
            "analytics": analytics,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Started {
            task_id,
            agent,
            attempt,
        } => format!("started   {} via {} (attempt {})", task_id, agent, attempt),
        ProgressEvent::Retrying {
            task_id,
            agent,
            error,
        } => format!("retrying  {} via {}: {}", task_id, agent, error),
        ProgressEvent::Completed { task_id, agent } => {
            format!("completed {} via {}", task_id, agent)
        }
        ProgressEvent::Failed {
            task_id,
            agent,
            error,
        } => format!("failed    {} via {}: {}", task_id, agent, error),
    }
}
