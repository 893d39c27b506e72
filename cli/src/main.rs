//! CLI entrypoint for roundtable
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use roundtable_application::{
    ConversationLogger, DiscussionRepository, EngineConfig, GenerateTitleUseCase,
    ManageDiscussionUseCase, NoConversationLogger, PendingInputQueue, RunDiscussionUseCase,
    RunEvent, RunRegistry, SummarizeMessageUseCase, SummaryScheduler,
};
use roundtable_domain::{
    Agent, DiscussionId, DiscussionMode, LlmBinding, Material, MessageId, NewDiscussion,
};
use roundtable_infrastructure::{
    ConfigLoader, FileConfig, GatewaySettings, JsonDiscussionStore, JsonlConversationLogger,
    OpenAiCompatibleGateway,
};
use roundtable_presentation::{
    Cli, Command, ConsoleFormatter, NewArgs, ProgressReporter, RunArgs, RunEventView,
    SimpleProgress,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };
    for issue in file_config.validate() {
        eprintln!("{}", issue);
    }

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{}", line);
        }
        println!();
        print!("{}", file_config.to_toml()?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let settings = Settings::from_file_config(&file_config);
    let app = App::build(settings).await?;
    app.dispatch(command, cli.quiet).await
}

/// Install stderr logging from `-v`, plus a file layer for `--log-file`.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("--log-file {} has no file name", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Configuration resolved into the types the layers consume.
struct Settings {
    engine: EngineConfig,
    default_max_rounds: u32,
    binding: LlmBinding,
    gateway: GatewaySettings,
    summary: Option<(LlmBinding, GatewaySettings)>,
    storage_path: PathBuf,
    conversation_log: Option<PathBuf>,
}

impl Settings {
    /// Issues were already reported by `FileConfig::validate`.
    fn from_file_config(config: &FileConfig) -> Self {
        let (budget, _) = config.context_budget.to_context_budget();
        let (engine, _) = config.engine.to_engine_config(budget);
        let (default_max_rounds, _) = config.engine.parse_default_max_rounds();
        let (binding, _) = config.llm.to_binding("llm");
        let summary = config.summary_model.as_ref().map(|summary| {
            let (binding, _) = summary.to_binding("summary_model");
            (binding, summary.gateway_settings())
        });

        Self {
            engine,
            default_max_rounds,
            binding,
            gateway: config.llm.gateway_settings(),
            summary,
            storage_path: config.storage.path.clone(),
            conversation_log: config.logging.conversation_log.clone(),
        }
    }
}

struct App {
    settings: Settings,
    gateway: Arc<OpenAiCompatibleGateway>,
    repository: Arc<dyn DiscussionRepository>,
    manage: ManageDiscussionUseCase,
    run: RunDiscussionUseCase<OpenAiCompatibleGateway>,
}

impl App {
    async fn build(settings: Settings) -> Result<Self> {
        // === Dependency Injection ===
        let gateway = Arc::new(OpenAiCompatibleGateway::new(settings.gateway.clone())?);
        let repository: Arc<dyn DiscussionRepository> =
            Arc::new(JsonDiscussionStore::open(&settings.storage_path).await?);
        let registry = Arc::new(RunRegistry::new());
        let pending = Arc::new(PendingInputQueue::new());

        let logger: Arc<dyn ConversationLogger> = match settings
            .conversation_log
            .as_ref()
            .and_then(|path| JsonlConversationLogger::open(path))
        {
            Some(logger) => {
                info!("Conversation log: {}", logger.path().display());
                Arc::new(logger)
            }
            None => Arc::new(NoConversationLogger),
        };

        let mut run = RunDiscussionUseCase::new(
            Arc::clone(&gateway),
            Arc::clone(&repository),
            Arc::clone(&registry),
            Arc::clone(&pending),
        )
        .with_engine_config(settings.engine.clone())
        .with_logger(logger);

        if let Some((binding, gateway_settings)) = &settings.summary {
            let summary_gateway = Arc::new(OpenAiCompatibleGateway::new(gateway_settings.clone())?);
            let summaries: Arc<dyn SummaryScheduler> = Arc::new(SummarizeMessageUseCase::new(
                summary_gateway,
                Arc::clone(&repository),
                binding.clone(),
            ));
            run = run.with_summaries(summaries);
        }

        let manage = ManageDiscussionUseCase::new(Arc::clone(&repository), registry, pending);

        Ok(Self {
            settings,
            gateway,
            repository,
            manage,
            run,
        })
    }

    async fn dispatch(&self, command: Command, quiet: bool) -> Result<()> {
        match command {
            Command::New(args) => self.create(args).await,
            Command::Run(args) => self.run_discussion(args, quiet).await,
            Command::Input { id, text } => {
                let message = self
                    .manage
                    .submit_user_input(DiscussionId(id), &text)
                    .await?;
                println!(
                    "Added message #{} to discussion #{} (cycle {})",
                    message.id,
                    id,
                    message.cycle_index + 1
                );
                Ok(())
            }
            Command::Complete { id } => {
                if !self.manage.mark_completed(DiscussionId(id)).await? {
                    bail!("Discussion {} not found", id);
                }
                println!("Discussion #{} marked completed", id);
                Ok(())
            }
            Command::Stop { id } => {
                if !self.run.stop(DiscussionId(id)).await? {
                    bail!("Discussion {} not found", id);
                }
                println!("Discussion #{} stopped", id);
                Ok(())
            }
            Command::Reset { id } => {
                if !self.manage.reset(DiscussionId(id)).await? {
                    bail!("Discussion {} not found", id);
                }
                println!("Discussion #{} reset", id);
                Ok(())
            }
            Command::Show { id, json } => {
                let discussion = self.manage.get(DiscussionId(id)).await?;
                if json {
                    println!("{}", ConsoleFormatter::format_json(&discussion));
                } else {
                    print!("{}", ConsoleFormatter::format_discussion(&discussion));
                }
                Ok(())
            }
            Command::List => {
                print!("{}", ConsoleFormatter::format_list(&self.manage.list().await?));
                Ok(())
            }
            Command::Truncate { id, after } => {
                match self
                    .manage
                    .truncate_after(DiscussionId(id), after.map(MessageId))
                    .await?
                {
                    Some(removed) => println!("Deleted {} messages from discussion #{}", removed, id),
                    None => bail!("Discussion {} or message {:?} not found", id, after),
                }
                Ok(())
            }
            Command::Title { id } => {
                let title = GenerateTitleUseCase::new(
                    Arc::clone(&self.gateway),
                    Arc::clone(&self.repository),
                )
                .execute(DiscussionId(id))
                .await?;
                println!("{}", title);
                Ok(())
            }
        }
    }

    async fn create(&self, args: NewArgs) -> Result<()> {
        let binding = self.settings.binding.clone();
        let agents: Vec<Agent> = args
            .agents
            .iter()
            .map(|spec| Agent::new(&spec.name, spec.role, &spec.persona, binding.clone()))
            .collect();
        let mode = if agents.is_empty() {
            args.mode
        } else {
            DiscussionMode::Custom
        };

        let mut materials = Vec::with_capacity(args.materials.len());
        for path in &args.materials {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read material {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            materials.push(Material::file(name, text));
        }

        let discussion = self
            .manage
            .create(
                NewDiscussion::new(args.topic)
                    .with_mode(mode)
                    .with_max_rounds(args.max_rounds.unwrap_or(self.settings.default_max_rounds))
                    .with_agents(agents)
                    .with_llm_configs(vec![binding])
                    .with_materials(materials),
            )
            .await?;

        println!(
            "Created discussion #{} ({} mode, up to {} rounds)",
            discussion.id, discussion.mode, discussion.max_rounds
        );
        println!("Start it with: roundtable run {}", discussion.id);
        Ok(())
    }

    async fn run_discussion(&self, args: RunArgs, quiet: bool) -> Result<()> {
        let id = DiscussionId(args.id);
        let view: Box<dyn RunEventView> = if quiet {
            Box::new(SimpleProgress)
        } else {
            Box::new(ProgressReporter::new())
        };

        let mut events = self.run.start_run(id, args.force_single_round()).await?;
        let mut failed = None;
        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted, stopping discussion {}", id);
                    self.run.stop(id).await?;
                    bail!("Discussion {} interrupted", id);
                }
                event = events.next() => {
                    let Some(event) = event else { break };
                    view.on_event(&event);
                    if let RunEvent::Error { content } = &event {
                        failed = Some(content.clone());
                    }
                }
            }
        }

        if let Some(reason) = failed {
            bail!("Discussion {} failed: {}", id, reason);
        }
        Ok(())
    }
}
