use clap::{Parser, Subcommand};
use codedojo::catalog::{Choice, ProblemFilter, ProblemSummary};
use codedojo::reqwest_transport::ReqwestTransport;
use codedojo::{ApiClient, ApiConfig, ApiError, ConfigError, Outcome, Role, Session, SessionManager};
use serde_json::{Value, json};


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing credentials; pass --email/--password or set CODEDOJO_EMAIL/CODEDOJO_PASSWORD")]
    MissingCredentials,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("JSON payload must be an object")]
    NotAnObject,
}

#[derive(Parser, Debug)]
#[command(name = "codedojo", about = "CodeDojo session and dashboard CLI")]
struct Cli {
    /// Overrides `CODEDOJO_API_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `CODEDOJO_REQUEST_TIMEOUT_SECS`.
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Overrides `CODEDOJO_CONNECT_TIMEOUT_SECS`.
    #[arg(long)]
    connect_timeout_secs: Option<u64>,

    /// Log in with these credentials before running the command.
    #[arg(long, env = "CODEDOJO_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "CODEDOJO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log in through the admin route. `logout` follows the role of the
    /// session it ends, so it only hits the admin route after an admin login
    /// in the same invocation.
    #[arg(long, default_value_t = false)]
    admin: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Ask the backend whether the cookie jar holds a live session.
    Check,
    Login,
    Signup {
        #[arg(long)]
        data: String,
    },
    Logout,
    UpdateProfile {
        #[arg(long)]
        data: String,
    },
    /// Submission stats (solved count only).
    Stats,
    Contests,
    Problems {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = "all")]
        difficulty: String,
        #[arg(long, default_value = "all")]
        topic: String,
    },
}

type Manager = SessionManager<ReqwestTransport>;

impl Cli {
    fn config(&self) -> Result<ApiConfig, CliError> {
        let mut config = ApiConfig::from_env()?;
        if let Some(raw) = &self.base_url {
            config = config.with_base_url(raw)?;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.timeouts.request_secs = secs;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.timeouts.connect_secs = secs;
        }
        Ok(config)
    }

    fn role(&self) -> Role {
        Role::from_admin_flag(self.admin)
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        self.email.as_deref().zip(self.password.as_deref())
    }

    /// Whether to log in before the command; `login` does so itself.
    fn needs_login_first(&self) -> bool {
        self.credentials().is_some() && self.command != Command::Login
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = cli.config()?;
    let transport = ReqwestTransport::new(&config)?;
    let manager = SessionManager::new(ApiClient::new(config, transport));

    if cli.needs_login_first() {
        login(&cli, &manager).await?;
    }

    let output = run(&cli, &manager).await?;
    print_json(&output)
}

async fn login(cli: &Cli, manager: &Manager) -> Result<(), CliError> {
    let (email, password) = cli.credentials().ok_or(CliError::MissingCredentials)?;
    manager.login(email, password, cli.role()).await?;
    tracing::info!(role = %cli.role(), "logged in");
    Ok(())
}

async fn run(cli: &Cli, manager: &Manager) -> Result<Value, CliError> {
    match &cli.command {
        Command::Check => {
            manager.check_session().await;
            Ok(session_json(&manager.session()))
        }
        Command::Login => {
            login(cli, manager).await?;
            Ok(session_json(&manager.session()))
        }
        Command::Signup { data } => {
            manager.signup(&parse_object(data)?).await?;
            Ok(session_json(&manager.session()))
        }
        Command::Logout => {
            manager.logout().await;
            Ok(session_json(&manager.session()))
        }
        Command::UpdateProfile { data } => {
            manager.update_profile(&parse_object(data)?).await?;
            Ok(session_json(&manager.session()))
        }
        Command::Stats => Ok(manager.submission_stats().await.to_json("stats")),
        Command::Contests => Ok(manager.upcoming_contests().await.to_json("contests")),
        Command::Problems { search, difficulty, topic } => {
            let filter = ProblemFilter {
                search: search.clone(),
                difficulty: Choice::parse(difficulty),
                topic: Choice::parse(topic),
            };
            Ok(filtered_catalog(manager.problem_catalog().await, &filter))
        }
    }
}

fn filtered_catalog(outcome: Outcome<Vec<ProblemSummary>>, filter: &ProblemFilter) -> Value {
    let success = outcome.is_success();
    let problems = filter.apply(outcome.value());
    json!({ "success": success, "problems": problems })
}

fn session_json(session: &Session) -> Value {
    json!({
        "authenticated": session.is_authenticated(),
        "isAdmin": session.is_admin,
        "user": session.user,
    })
}

fn parse_object(data: &str) -> Result<Value, CliError> {
    let value = serde_json::from_str::<Value>(data)?;
    if value.is_object() { Ok(value) } else { Err(CliError::NotAnObject) }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
