use std::collections::HashMap;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tl_domain::config::{Config, ProfileConfig, ProvidersConfig};
use tl_domain::ctx::NoCancel;
use tl_providers::registry::ProviderRegistry;
use tl_providers::testing::ScriptedProvider;
use tl_providers::traits::LlmProvider;
use tl_runtime::{Runtime, TurnRequest};
use tl_skills::SkillsRegistry;
use tl_tasks::{TaskStore, TaskTracker};
use tl_sessions::SessionStore;
use tl_tools::ToolRegistry;

/// Wires the library crates together for local experimentation. This
/// is not a product surface: it does not parse subcommands, manage a
/// PID file, or offer an interactive shell. It loads a config file if
/// one is given, starts a provider rotation backed by a scripted
/// provider, and runs a single turn against it.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tl_runtime=info")),
        )
        .json()
        .init();

    tracing::info!("taskloom demo starting");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".into());
    let mut config: Config = match std::fs::read_to_string(&config_path) {
        Ok(raw) => toml::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %config_path, "failed to parse config, using defaults");
            Config::default()
        }),
        Err(_) => {
            tracing::info!(path = %config_path, "no config file found, using defaults");
            Config::default()
        }
    };

    if config.providers.profiles.is_empty() {
        config.providers = ProvidersConfig {
            profiles: vec![ProfileConfig {
                name: "demo".into(),
                priority: 0,
                kind: "scripted".into(),
                model: None,
            }],
            ..config.providers
        };
    }

    let sessions_cfg = config.sessions.clamped();
    let sessions = Arc::new(SessionStore::new(&sessions_cfg.state_dir, sessions_cfg.message_window)?);

    let skills = Arc::new(SkillsRegistry::empty());
    let tools = Arc::new(ToolRegistry::new());

    let task_store = Arc::new(TaskStore::new(&config.task_store.snapshot_path)?);
    let tracker = Arc::new(TaskTracker::new(task_store, &config.task_store.tracker_path)?);

    let role_pool = Arc::new(tl_runtime::RolePool::new(&config.role_pool));

    let mut providers_by_kind: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    providers_by_kind.insert("scripted".into(), Arc::new(ScriptedProvider::always_ok("demo-model")));

    let registry = ProviderRegistry::build(&config.providers, &providers_by_kind)?;
    for init_error in registry.init_errors() {
        tracing::warn!(
            profile = %init_error.profile_name,
            kind = %init_error.kind,
            error = %init_error.error,
            "provider profile failed to initialize"
        );
    }
    let providers = Arc::new(registry.into_rotation());

    let runtime = Runtime::new(
        sessions,
        skills,
        tools,
        providers,
        tracker,
        role_pool,
        config.agents.clone(),
        config.turn,
        "You are a helpful assistant.",
    );

    let outcome = runtime
        .run(
            &NoCancel,
            TurnRequest {
                session_key: "demo-session".into(),
                prompt: "Say hello.".into(),
                system_prompt: None,
                metadata: HashMap::new(),
            },
        )
        .await?;

    tracing::info!(output = %outcome.output, canceled = outcome.canceled, "turn finished");
    println!("{}", outcome.output);

    Ok(())
}
