use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cli::report::{format_dry_run, format_rendered, format_status};
use cli::Overrides;
use recipe::templates::{render_all, TemplateVars};
use recipe::{Action, HostFacts, HostRuntime, MemoryHost, Recipe, RecipeConfig, SystemHost};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "rb-reputation-ctl")]
#[command(about = "Provision the rb-reputation service and manage its discovery registration", long_about = None)]
struct Cli {
    /// Config file (defaults to /etc/rb-reputation/provisioner.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Exit with an error when the action fails instead of only logging it
    #[arg(long, global = true)]
    strict: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct VarArgs {
    /// Memory for the service in MB
    #[arg(short, long)]
    memory: Option<u32>,
    /// Aerospike addresses, comma separated
    #[arg(long, value_delimiter = ',')]
    aerospike_ips: Vec<String>,
}

impl From<VarArgs> for Overrides {
    fn from(args: VarArgs) -> Self {
        Overrides {
            memory: args.memory,
            aerospike_ips: args.aerospike_ips,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Install, configure, enable and start the service
    Add {
        #[command(flatten)]
        vars: VarArgs,
        /// Print the steps a fresh host would need without changing this one
        #[arg(long)]
        dry_run: bool,
    },
    /// Disable and stop the service
    Remove {
        /// Print the steps without changing this host
        #[arg(long)]
        dry_run: bool,
    },
    /// Register the service instance with the local discovery agent
    Register,
    /// Deregister the service instance from the local discovery agent
    Deregister,
    /// Show service, config file and registration status
    Status,
    /// Print the rendered config files without writing them
    Render {
        #[command(flatten)]
        vars: VarArgs,
    },
}

fn load_config(path: Option<&PathBuf>, overrides: Overrides) -> anyhow::Result<RecipeConfig> {
    let mut config = RecipeConfig::load_or_default(path.map(|p| p.as_path()))
        .context("Failed to load configuration")?;
    config.apply_env();
    overrides.apply(&mut config);
    Ok(config)
}

fn system_recipe(
    path: Option<&PathBuf>,
    overrides: Overrides,
) -> anyhow::Result<Recipe<SystemHost>> {
    let config = load_config(path, overrides)?;
    Ok(Recipe::new(SystemHost::new(), config, HostFacts::discover())?)
}

async fn run_action<H: HostRuntime>(
    recipe: &Recipe<H>,
    action: Action,
    strict: bool,
) -> anyhow::Result<()> {
    let outcome = recipe.run(action).await;
    if strict {
        if let Some(e) = outcome.error {
            error!("{} failed with --strict set, exiting non-zero", action);
            anyhow::bail!("{} failed: {}", action, e);
        }
    }
    Ok(())
}

async fn dry_run(config: RecipeConfig, action: Action) -> anyhow::Result<()> {
    let recipe = Recipe::new(MemoryHost::new(), config, HostFacts::discover())?;
    recipe.run(action).await;
    print!("{}", format_dry_run(&recipe.host().calls().await));
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    cli::init_tracing("info");

    let cli = Cli::parse();
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Add { vars, dry_run: true } => {
            dry_run(load_config(config_path, vars.into())?, Action::Add).await?;
        }
        Commands::Remove { dry_run: true } => {
            dry_run(load_config(config_path, Overrides::default())?, Action::Remove).await?;
        }
        Commands::Render { vars } => {
            let config = load_config(config_path, vars.into())?;
            config.validate()?;
            let vars = TemplateVars {
                memory: config.memory,
                aerospike_ips: &config.aerospike_ips,
            };
            print!("{}", format_rendered(&render_all(&config.config_dir, &vars)));
        }
        Commands::Add { vars, .. } => {
            let recipe = system_recipe(config_path, vars.into())?;
            run_action(&recipe, Action::Add, cli.strict).await?;
        }
        Commands::Remove { .. } => {
            let recipe = system_recipe(config_path, Overrides::default())?;
            run_action(&recipe, Action::Remove, cli.strict).await?;
        }
        Commands::Register => {
            let recipe = system_recipe(config_path, Overrides::default())?;
            run_action(&recipe, Action::Register, cli.strict).await?;
        }
        Commands::Deregister => {
            let recipe = system_recipe(config_path, Overrides::default())?;
            run_action(&recipe, Action::Deregister, cli.strict).await?;
        }
        Commands::Status => {
            let recipe = system_recipe(config_path, Overrides::default())?;
            let report = recipe.status().await?;
            print!("{}", format_status(&recipe.config().service_name, &report));
        }
    }

    Ok(())
}
