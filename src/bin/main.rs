use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use strategy_resolver::config::{load_routes, resolve_auth_json_path};
use strategy_resolver::{
    BuiltinFactories, InMemoryVerifierRegistry, RouteKey, StrategyFactories, StrategyName,
    StrategyResolver, VerifyFunction,
};

#[derive(Parser)]
#[command(name = "strategy-resolver")]
#[command(about = "Inspect per-route authentication strategy configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every route's strategy name and options
    Check {
        /// Path to auth.json
        #[arg(long, env = "AUTH_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Resolve the strategy protecting one route
    Resolve {
        /// Route key, e.g. "GET /me" or "/me"
        route: String,
        /// Path to auth.json
        #[arg(long, env = "AUTH_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// Factory table whose defaults reject every credential.
fn rejecting_factories() -> StrategyFactories {
    StrategyName::ALL
        .into_iter()
        .fold(BuiltinFactories::new(), |builder, name| {
            builder.with_default_verifier(VerifyFunction::reject_all(name))
        })
        .into_factories()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("strategy_resolver=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let path = resolve_auth_json_path(config.as_deref())?;
            info!("Checking routes in {}", path.display());
            let routes = load_routes(&path)?;
            let factories = rejecting_factories();

            let mut failures = 0;
            for (route, meta) in &routes {
                let name = match meta.strategy_name() {
                    Ok(name) => name,
                    Err(e) => {
                        warn!("{}: {}", route, e);
                        failures += 1;
                        continue;
                    }
                };
                match factories.get(name).create(&meta.options, None) {
                    Ok(_) => println!("ok     {:<32} {}", route.as_str(), name),
                    Err(e) => {
                        warn!("{}: {}", route, e);
                        failures += 1;
                    }
                }
            }

            if failures > 0 {
                return Err(anyhow::anyhow!(
                    "{} of {} routes failed validation",
                    failures,
                    routes.len()
                ));
            }
            info!("All {} routes are valid", routes.len());
        }
        Commands::Resolve { route, config } => {
            let path = resolve_auth_json_path(config.as_deref())?;
            let routes = load_routes(&path)?;
            let key = RouteKey::new(route);
            let Some(meta) = routes.get(&key) else {
                return Err(anyhow::anyhow!("No route `{}` in {}", key, path.display()));
            };

            // Stand in for the named verifier with one of the right shape.
            let mut registry = InMemoryVerifierRegistry::new();
            if let (Some(verifier), Ok(name)) = (&meta.verifier, meta.strategy_name()) {
                registry = registry.register(verifier.clone(), VerifyFunction::reject_all(name));
            }

            let resolver = StrategyResolver::new(rejecting_factories(), Arc::new(registry));
            match resolver.resolve(Some(meta)).await? {
                Some(strategy) => println!("{}", strategy.name()),
                None => println!("unauthenticated"),
            }
        }
    }

    Ok(())
}
