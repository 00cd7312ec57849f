use std::sync::Arc;

use authgate::config::{ClientConfig, ConfigError};
use authgate::guard::navigation::NavigationGuard;
use authgate::guard::routes::{RouteRecord, RouteTable};
use authgate::net::api::{ApiError, HttpAuthApi};
use authgate::net::types::{ApiResponse, LoginForm, ResetPasswordForm, SignUpForm};
use authgate::router::{History, Router, RouterError};
use authgate::state::session::{InitError, SessionStore};
use authgate::util::persistence::{FileStore, MemoryStore, StorageError};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error("not signed in: {0}")]
    NotSignedIn(#[from] InitError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "authgate", about = "Auth session and route guard client")]
struct Cli {
    /// Overrides `AUTH_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `AUTH_STATE_FILE`.
    #[arg(long)]
    state_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the route table with its access metadata.
    Routes,
    /// Confirm the session with the server and print the user.
    Whoami,
    Login(Credentials),
    /// End the server session and clear local state.
    Logout,
    Signup(SignupArgs),
    ResendConfirmation(EmailArgs),
    RequestReset(EmailArgs),
    ResetPassword(ResetArgs),
    /// Run paths through the guard and print where each one lands.
    Navigate(NavigateArgs),
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long, env = "AUTH_PASSWORD")]
    password: String,
    #[arg(long)]
    remember_me: bool,
}

impl From<Credentials> for LoginForm {
    fn from(c: Credentials) -> Self {
        Self { email: c.email, password: c.password, remember_me: c.remember_me }
    }
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(long)]
    display_name: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "AUTH_PASSWORD")]
    password: String,
    /// Defaults to `--password`.
    #[arg(long)]
    password_confirmation: Option<String>,
    #[arg(long)]
    invitation_id: Option<i64>,
}

#[derive(Args, Debug)]
struct EmailArgs {
    #[arg(long)]
    email: Option<String>,
}

#[derive(Args, Debug)]
struct ResetArgs {
    #[arg(long)]
    token: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long, env = "AUTH_PASSWORD")]
    password: String,
    #[arg(long)]
    password_confirmation: Option<String>,
}

#[derive(Args, Debug)]
struct NavigateArgs {
    #[arg(required = true)]
    paths: Vec<String>,
    /// Sign in first, so guarded routes can be reached in this run.
    #[arg(long, requires = "password")]
    email: Option<String>,
    #[arg(long, env = "AUTH_PASSWORD")]
    password: Option<String>,
}

impl NavigateArgs {
    /// Credentials to sign in with first. A password without an email is
    /// reported and ignored.
    fn sign_in_form(&self) -> Option<LoginForm> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => {
                Some(LoginForm { email: email.clone(), password: password.clone(), remember_me: false })
            }
            (None, Some(_)) => {
                tracing::warn!("password given without --email; navigating signed out");
                None
            }
            _ => None,
        }
    }
}

struct Context {
    session: SessionStore,
    router: Router,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url)?;
    }
    if let Some(state_file) = cli.state_file {
        config.state_file = state_file;
    }

    let ctx = build_context(config)?;
    match cli.command {
        Command::Routes => {
            print_routes(ctx.router.table().routes(), 0);
            Ok(())
        }
        Command::Whoami => run_whoami(&ctx).await,
        Command::Login(creds) => run_login(&ctx, creds.into()).await,
        Command::Logout => run_logout(&ctx).await,
        Command::Signup(args) => run_signup(&ctx, args).await,
        Command::ResendConfirmation(args) => {
            let response = ctx.session.resend_confirmation_email(args.email.as_deref()).await?;
            print_response(&response)
        }
        Command::RequestReset(args) => {
            let response = ctx.session.request_password_reset(args.email.as_deref()).await?;
            print_response(&response)
        }
        Command::ResetPassword(args) => run_reset(&ctx, args).await,
        Command::Navigate(args) => run_navigate(&ctx, args).await,
    }
}

fn build_context(config: ClientConfig) -> Result<Context, CliError> {
    let durable = Arc::new(FileStore::open(&config.state_file)?);
    let history = History::new();
    let api = Arc::new(HttpAuthApi::new(config)?);
    let session = SessionStore::builder(api)
        .durable(durable)
        .transient(Arc::new(MemoryStore::new()))
        .navigator(Arc::new(history.clone()))
        .build();
    let router = Router::new(RouteTable::default(), NavigationGuard::new(session.clone()), history);
    Ok(Context { session, router })
}

fn print_routes(records: &[RouteRecord], depth: usize) {
    for record in records {
        let meta = &record.meta;
        let mut flags = Vec::new();
        if meta.requires_auth {
            flags.push("requires-auth".to_owned());
        }
        if meta.guest_only {
            flags.push("guest-only".to_owned());
        }
        if !meta.perms_any.is_empty() {
            flags.push(format!("any[{}]", meta.perms_any.join(",")));
        }
        if !meta.perms_all.is_empty() {
            flags.push(format!("all[{}]", meta.perms_all.join(",")));
        }
        println!(
            "{:indent$}{:<24} {:<12} {}",
            "",
            record.path,
            record.name.as_deref().unwrap_or("-"),
            flags.join(" "),
            indent = depth * 2
        );
        print_routes(&record.children, depth + 1);
    }
}

fn print_response(response: &ApiResponse) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(&response.body)?;
    println!("{} {rendered}", response.status);
    Ok(())
}

async fn run_whoami(ctx: &Context) -> Result<(), CliError> {
    let user = ctx.session.init().await?;
    println!("{}", serde_json::to_string_pretty(&user)?);
    Ok(())
}

async fn run_login(ctx: &Context, form: LoginForm) -> Result<(), CliError> {
    let response = ctx.session.login(&form).await?;
    print_response(&response)?;
    match ctx.session.user() {
        Some(user) => eprintln!("signed in as {} <{}>", user.display_name, user.email),
        None => eprintln!("login accepted but the session could not be confirmed"),
    }
    Ok(())
}

async fn run_logout(ctx: &Context) -> Result<(), CliError> {
    let result = ctx.session.logout_user().await;
    if let Some(nav) = ctx.router.follow_pending().await? {
        eprintln!("now at {}", nav.location.full_path());
    }
    result?;
    Ok(())
}

async fn run_signup(ctx: &Context, args: SignupArgs) -> Result<(), CliError> {
    let form = SignUpForm {
        display_name: args.display_name,
        email: args.email,
        password_confirmation: args.password_confirmation.unwrap_or_else(|| args.password.clone()),
        password: args.password,
    };
    let response = ctx.session.sign_up(&form, args.invitation_id).await?;
    print_response(&response)
}

async fn run_reset(ctx: &Context, args: ResetArgs) -> Result<(), CliError> {
    let form = ResetPasswordForm {
        token: args.token,
        email: args.email,
        password_confirmation: args.password_confirmation.unwrap_or_else(|| args.password.clone()),
        password: args.password,
    };
    let response = ctx.session.reset_password(&form).await?;
    print_response(&response)
}

async fn run_navigate(ctx: &Context, args: NavigateArgs) -> Result<(), CliError> {
    if let Some(form) = args.sign_in_form() {
        ctx.session.login(&form).await?;
    }

    for path in &args.paths {
        match ctx.router.navigate(path).await {
            Ok(nav) => {
                let via: Vec<&str> = nav.redirects.iter().map(|r| r.name.as_str()).collect();
                println!(
                    "{path} -> {} [{}]{}",
                    nav.location.full_path(),
                    nav.title.as_deref().unwrap_or("-"),
                    if via.is_empty() { String::new() } else { format!(" via {}", via.join(" -> ")) }
                );
            }
            Err(e) => println!("{path} -> error: {e}"),
        }
    }
    Ok(())
}
