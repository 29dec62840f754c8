use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use tracing::{debug, info};

use warbler::auth::AuthOutcome;
use warbler::config::{self, APP_NAME, AppConfig, AppPaths, DatabaseTarget};
use warbler::db::Database;
use warbler::follow::FollowRepository;
use warbler::logging::{self, Verbosity};
use warbler::message::MessageRepository;
use warbler::user::{User, UserRepository, UserService};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
        return Ok(());
    }

    let ctx = RuntimeContext::new(cli.common.clone())?;
    logging::init_logging(
        &ctx.config.logging,
        Verbosity {
            quiet: ctx.common.quiet,
            verbose: ctx.common.verbose,
        },
    );
    debug!("config file: {}", ctx.paths.config_file.display());

    match cli.command {
        Command::Config { command } => handle_config(&ctx, command),
        command => run_async(ctx, command),
    }
}

#[tokio::main]
async fn run_async(ctx: RuntimeContext, command: Command) -> Result<()> {
    let db = open_database(&ctx).await?;
    let result = handle_command(&ctx, &db, command).await;
    db.close().await;
    result
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Warbler - account store administration.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Create a new account
    Signup(SignupCommand),
    /// Check a username/password pair
    Login(CredentialsArgs),
    /// Make one user follow another
    Follow(FollowArgs),
    /// Remove a follow edge
    Unfollow(FollowArgs),
    /// Show a user with messages, follows and likes
    Show {
        username: String,
    },
    /// Search users by username
    Users {
        /// Substring to match; lists everyone when omitted
        #[arg(default_value = "")]
        query: String,
        #[arg(short, long, default_value = "100")]
        limit: i64,
    },
    /// Post a message as a user
    Post {
        username: String,
        text: String,
    },
    /// Show a user's home timeline
    Timeline {
        username: String,
        #[arg(short, long, default_value = "100")]
        limit: i64,
    },
    /// Like a message, or remove an existing like
    Like {
        username: String,
        message_id: i64,
    },
    /// Delete an account and everything it owns
    Delete(CredentialsArgs),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct SignupCommand {
    username: String,
    email: String,
    /// Account password
    #[arg(long, env = "WARBLER_PASSWORD", hide_env_values = true)]
    password: String,
    /// Profile image URL
    #[arg(long)]
    image_url: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct CredentialsArgs {
    username: String,
    /// Account password
    #[arg(long, env = "WARBLER_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, Clone, Args)]
struct FollowArgs {
    /// User doing the following
    follower: String,
    /// User being followed
    followed: String,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone())?;
        let config = config::load_config(&paths.config_file)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn user_service(&self) -> UserService {
        UserService::new(self.config.auth.hasher())
    }

    /// Print `value` as JSON with `--json`, otherwise the human rendering.
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) -> Result<()> {
        if self.common.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("serializing output to JSON")?
            );
        } else if !self.common.quiet {
            println!("{}", human());
        }
        Ok(())
    }
}

async fn open_database(ctx: &RuntimeContext) -> Result<Database> {
    let max_connections = ctx.config.database.max_connections;
    let db = match ctx.config.database.target(&ctx.paths.data_dir)? {
        DatabaseTarget::Url(url) => Database::connect(&url, max_connections).await,
        DatabaseTarget::Path(path) => {
            debug!("database file: {}", path.display());
            Database::open(&path, max_connections).await
        }
    }
    .context("opening database")?;

    Ok(db)
}

async fn find_user(conn: &mut SqliteConnection, username: &str) -> Result<User> {
    UserRepository::get_by_username(conn, username)
        .await?
        .ok_or_else(|| anyhow!("user not found: {username}"))
}

async fn handle_command(ctx: &RuntimeContext, db: &Database, command: Command) -> Result<()> {
    let users = ctx.user_service();
    let mut session = db.begin().await?;

    match command {
        Command::Migrate => {
            // Migrations already ran when the database was opened.
            ctx.emit(&"ok", || "Database is up to date".to_string())?;
        }
        Command::Signup(cmd) => {
            let new_user =
                users.signup(&cmd.username, &cmd.email, &cmd.password, cmd.image_url.as_deref())?;
            let user = UserRepository::insert(session.conn(), &new_user)
                .await
                .with_context(|| format!("creating user {}", cmd.username))?;
            info!(user_id = user.id, "Signed up {}", user.username);
            ctx.emit(&user, || format!("Created {user}"))?;
        }
        Command::Login(cmd) => {
            match users
                .authenticate(session.conn(), &cmd.username, &cmd.password)
                .await?
            {
                AuthOutcome::Authenticated(user) => {
                    ctx.emit(&user, || format!("Authenticated {user}"))?;
                }
                AuthOutcome::NotFound | AuthOutcome::InvalidCredentials => {
                    bail!("invalid username or password");
                }
            }
        }
        Command::Follow(args) => {
            let follower = find_user(session.conn(), &args.follower).await?;
            let followed = find_user(session.conn(), &args.followed).await?;
            FollowRepository::follow(session.conn(), follower.id, followed.id)
                .await
                .with_context(|| format!("{} following {}", follower.username, followed.username))?;
            ctx.emit(&true, || {
                format!("{} now follows {}", follower.username, followed.username)
            })?;
        }
        Command::Unfollow(args) => {
            let follower = find_user(session.conn(), &args.follower).await?;
            let followed = find_user(session.conn(), &args.followed).await?;
            let removed =
                FollowRepository::unfollow(session.conn(), follower.id, followed.id).await?;
            ctx.emit(&removed, || {
                if removed {
                    format!("{} no longer follows {}", follower.username, followed.username)
                } else {
                    format!("{} was not following {}", follower.username, followed.username)
                }
            })?;
        }
        Command::Show { username } => {
            let user = find_user(session.conn(), &username).await?;
            let detail = users.detail(session.conn(), user.id).await?;
            ctx.emit(&detail, || {
                let names = |list: &[User]| {
                    list.iter()
                        .map(|u| u.username.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                format!(
                    "{}\n  messages: {}\n  following ({}): {}\n  followers ({}): {}\n  likes: {}",
                    detail.user,
                    detail.messages.len(),
                    detail.following.len(),
                    names(detail.following.as_slice()),
                    detail.followers.len(),
                    names(detail.followers.as_slice()),
                    detail.likes.len(),
                )
            })?;
        }
        Command::Users { query, limit } => {
            let found = UserRepository::search(session.conn(), &query, limit).await?;
            ctx.emit(&found, || {
                found
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Command::Post { username, text } => {
            let user = find_user(session.conn(), &username).await?;
            let message = MessageRepository::create(session.conn(), user.id, &text).await?;
            ctx.emit(&message, || format!("Posted message #{}", message.id))?;
        }
        Command::Timeline { username, limit } => {
            let user = find_user(session.conn(), &username).await?;
            let entries = MessageRepository::timeline(session.conn(), user.id, limit).await?;
            ctx.emit(&entries, || {
                entries
                    .iter()
                    .map(|e| format!("#{} {} @{}: {}", e.id, e.timestamp, e.username, e.text))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Command::Like {
            username,
            message_id,
        } => {
            let user = find_user(session.conn(), &username).await?;
            let liked = MessageRepository::toggle_like(session.conn(), user.id, message_id).await?;
            ctx.emit(&liked, || {
                if liked {
                    format!("{} liked message #{message_id}", user.username)
                } else {
                    format!("{} unliked message #{message_id}", user.username)
                }
            })?;
        }
        Command::Delete(cmd) => {
            let Some(user) = users
                .authenticate(session.conn(), &cmd.username, &cmd.password)
                .await?
                .into_user()
            else {
                bail!("invalid username or password");
            };
            users.delete_user(session.conn(), user.id).await?;
            ctx.emit(&user, || format!("Deleted {user}"))?;
        }
        Command::Config { .. } | Command::Completions { .. } => {
            return Err(anyhow!("command does not use the database"));
        }
    }

    session.commit().await?;
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ctx.config)
                        .context("serializing config to JSON")?
                );
            } else {
                println!("{:#?}", ctx.config);
            }
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
        }
        ConfigCommand::Init { force } => {
            if ctx.paths.config_file.exists() && !force {
                bail!(
                    "config file already exists at {} (use --force to overwrite)",
                    ctx.paths.config_file.display()
                );
            }
            config::write_default_config(&ctx.paths.config_file)?;
            info!("wrote {}", ctx.paths.config_file.display());
        }
    }
    Ok(())
}
