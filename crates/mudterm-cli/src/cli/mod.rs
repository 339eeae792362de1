//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use mudterm_core::core::interrupt;
use mudterm_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "mudterm")]
#[command(version)]
#[command(about = "Terminal client for a multi-user text adventure")]
struct Cli {
    /// Configured environment to use (default: `environment` in config.toml)
    #[arg(long = "env", global = true, value_name = "NAME")]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct PlayerArgs {
    /// Character to play as
    #[arg(long, short = 'c', value_name = "ID")]
    character: String,

    /// Account user id (default: the signed-in account)
    #[arg(long, value_name = "ID", env = "MUDTERM_USER_ID")]
    user: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Join the game in the full-screen terminal UI
    #[cfg(feature = "tui")]
    Play {
        #[command(flatten)]
        player: PlayerArgs,
    },
    /// Join, send one command, and print the resulting messages
    Send {
        #[command(flatten)]
        player: PlayerArgs,

        /// Command text, e.g. `go north`
        #[arg(required = true, num_args = 1.., value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Check that the game server is reachable
    Health,
    /// Manage characters
    Characters {
        #[command(subcommand)]
        command: CharacterCommands,
    },
    /// Manage the player account
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum CharacterCommands {
    /// List characters owned by the signed-in account
    List,
    /// Show one character
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Roll attribute sets to compare (up to 3)
    Roll {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Create a character
    Create {
        /// Character name
        #[arg(long)]
        name: String,
        /// Race (HUMAN, DRACONIAN, SYNTH, CONSTRUCT, ANDROID)
        #[arg(long)]
        race: String,
        /// Class (SOLDIER, PILOT, HACKER, ENGINEER, MEDIC)
        #[arg(long)]
        class: String,
        /// Attributes as a JSON object; rolled on the server when omitted
        #[arg(long, value_name = "JSON")]
        attributes: Option<String>,
        /// Attribute sets to roll when --attributes is omitted (up to 3)
        #[arg(long, default_value_t = 1, conflicts_with = "attributes")]
        rolls: usize,
        /// Which roll to keep, starting at 1
        #[arg(long, default_value_t = 1, conflicts_with = "attributes")]
        pick: usize,
    },
    /// Delete a character
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum AccountCommands {
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MUDTERM_PASSWORD", hide_env_values = true)]
        password: String,
        /// Password again
        #[arg(long)]
        confirm: String,
    },
    /// Sign in and save the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MUDTERM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and remove the saved session
    Logout,
    /// Show the signed-in account
    Whoami,
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from the built-in defaults
    Generate,
    /// Set the default environment
    Use {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "tui")]
    let log_target = if matches!(cli.command, Commands::Play { .. }) {
        logging::LogTarget::Directory(config::paths::logs_dir())
    } else {
        logging::LogTarget::Stderr
    };
    #[cfg(not(feature = "tui"))]
    let log_target = logging::LogTarget::Stderr;
    let _log_guard = logging::init(log_target)?;

    interrupt::init()?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

/// Runs `fut`, returning `InterruptedError` if Ctrl+C arrives first.
async fn interruptible<F>(fut: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = fut => result,
        () = interrupt::wait_for_interrupt() => Err(interrupt::InterruptedError.into()),
    }
}

fn load(env: Option<&str>) -> Result<(config::Config, config::ResolvedEnvironment)> {
    let config = config::Config::load().context("load config")?;
    let environment = config.resolve_environment(env)?;
    Ok((config, environment))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { env, command } = cli;
    let env = env.as_deref();

    match command {
        // Config commands work even when the config file does not parse.
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
            ConfigCommands::Use { name } => commands::config::use_environment(&name),
        },

        #[cfg(feature = "tui")]
        Commands::Play { player } => {
            let (_, environment) = load(env)?;
            commands::play::run(&environment, &player.character, player.user).await
        }
        Commands::Send { player, command } => {
            let (_, environment) = load(env)?;
            interruptible(commands::send::run(
                &environment,
                &player.character,
                player.user,
                &command.join(" "),
            ))
            .await
        }
        Commands::Health => {
            let (_, environment) = load(env)?;
            interruptible(commands::health::run(&environment)).await
        }
        Commands::Characters { command } => {
            let (config, environment) = load(env)?;
            interruptible(characters(command, &config, &environment)).await
        }
        Commands::Account { command } => {
            let (config, _) = load(env)?;
            interruptible(account(command, &config)).await
        }
    }
}

async fn characters(
    command: CharacterCommands,
    config: &config::Config,
    environment: &config::ResolvedEnvironment,
) -> Result<()> {
    match command {
        CharacterCommands::List => commands::characters::list(config, environment).await,
        CharacterCommands::Show { id } => {
            commands::characters::show(config, environment, &id).await
        }
        CharacterCommands::Roll { count } => {
            commands::characters::roll(environment, count).await
        }
        CharacterCommands::Create {
            name,
            race,
            class,
            attributes,
            rolls,
            pick,
        } => {
            let args = commands::characters::CreateArgs {
                name: &name,
                race: &race,
                class: &class,
                attributes: attributes.as_deref(),
                rolls,
                pick,
            };
            commands::characters::create(config, environment, args).await
        }
        CharacterCommands::Delete { id } => {
            commands::characters::delete(config, environment, &id).await
        }
    }
}

async fn account(command: AccountCommands, config: &config::Config) -> Result<()> {
    match command {
        AccountCommands::Signup {
            email,
            password,
            confirm,
        } => commands::account::signup(config, &email, &password, &confirm).await,
        AccountCommands::Login { email, password } => {
            commands::account::login(config, &email, &password).await
        }
        AccountCommands::Logout => commands::account::logout(config).await,
        AccountCommands::Whoami => commands::account::whoami(),
    }
}
