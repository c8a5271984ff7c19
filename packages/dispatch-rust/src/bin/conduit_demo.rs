//! Small end-to-end run of a dispatcher: a validated query, a plain request,
//! and a request whose handler reports a business failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{ArgAction, Parser};
use conduit_core::{ArgumentError, ErrorDetail, Outcome, Validator};
use conduit_dispatch::{
    CancellationBehavior, DispatchResult, Dispatcher, DispatcherConfig, Handler, LoggingBehavior,
    Query, QueryHandler, Request, Validate, ValidationBehavior,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "conduit-demo", about = "Dispatch a few sample requests through a conduit pipeline")]
struct Args {
    /// Name reported in dispatch spans
    #[arg(long, env = "CONDUIT_NAME", default_value = "conduit-demo")]
    name: String,
    /// Open a `dispatch` span around every call
    #[arg(long, env = "CONDUIT_TRACE_DISPATCHES", default_value_t = true, action = ArgAction::Set)]
    trace_dispatches: bool,
    /// Log business failures returned by the pipeline
    #[arg(long, env = "CONDUIT_LOG_FAILURES", default_value_t = true, action = ArgAction::Set)]
    log_failures: bool,
    /// Users to create; an empty name or an age under 18 fails validation
    #[arg(long = "user", value_parser = parse_user, default_values_t = default_users())]
    users: Vec<NewUser>,
}

#[derive(Debug, Clone)]
struct NewUser {
    name: String,
    age: u32,
}

impl std::fmt::Display for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.age)
    }
}

fn parse_user(raw: &str) -> Result<NewUser> {
    let (name, age) = raw
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected NAME:AGE, got {raw:?}"))?;
    Ok(NewUser {
        name: name.to_string(),
        age: age.parse()?,
    })
}

fn default_users() -> Vec<NewUser> {
    vec![
        NewUser {
            name: "ada".to_string(),
            age: 36,
        },
        NewUser {
            name: String::new(),
            age: 12,
        },
    ]
}

// ---------------------------------------------------------------------------
// Requests and handlers
// ---------------------------------------------------------------------------

/// Details reported when a new user is rejected. Built once at start-up.
struct UserRules {
    name: ErrorDetail,
    age: ErrorDetail,
}

impl UserRules {
    fn new() -> Result<Self, ArgumentError> {
        Ok(Self {
            name: ErrorDetail::new("Name is required")?.with_path("User.Name"),
            age: ErrorDetail::new("Must be an adult")?
                .with_code("AGE")
                .with_path("User.Age"),
        })
    }
}

struct CreateUser {
    user: NewUser,
    rules: Arc<UserRules>,
}

impl Query for CreateUser {
    type Value = u64;
}

impl Validate for CreateUser {
    fn validate(&self) -> Outcome<()> {
        let user = &self.user;
        Validator::check(|| !user.name.trim().is_empty(), self.rules.name.clone())
            .and_check(|| user.age >= 18, self.rules.age.clone())
            .validate(None, None)
    }
}

#[derive(Default)]
struct CreateUserHandler {
    next_id: AtomicU64,
}

#[async_trait]
impl QueryHandler<CreateUser> for CreateUserHandler {
    async fn handle(&self, _query: &CreateUser, _cancel: &CancellationToken) -> DispatchResult<u64> {
        Ok(Outcome::success(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

struct Ping;
impl Request for Ping {}

struct PingHandler;

#[async_trait]
impl Handler<Ping> for PingHandler {
    async fn handle(&self, _request: &Ping, _cancel: &CancellationToken) -> DispatchResult {
        Ok(Outcome::ok())
    }
}

struct DeleteUser {
    id: u64,
}
impl Request for DeleteUser {}

struct DeleteUserHandler;

#[async_trait]
impl Handler<DeleteUser> for DeleteUserHandler {
    async fn handle(&self, request: &DeleteUser, _cancel: &CancellationToken) -> DispatchResult {
        Ok(Outcome::fail(
            format!("user {} is protected", request.id),
            Some("PROTECTED"),
        )?)
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let dispatcher = Dispatcher::builder()
        .config(DispatcherConfig {
            name: args.name,
            trace_dispatches: args.trace_dispatches,
            log_failures: args.log_failures,
        })
        .global_behavior(LoggingBehavior::new())
        .global_behavior(CancellationBehavior)
        .behavior::<CreateUser, _>(ValidationBehavior::new())
        .query_handler::<CreateUser, _>(CreateUserHandler::default())
        .handler::<Ping, _>(PingHandler)
        .handler::<DeleteUser, _>(DeleteUserHandler)
        .build();

    let cancel = CancellationToken::new();
    let rules = Arc::new(UserRules::new()?);

    let ping = dispatcher.send(&Ping, &cancel).await?;
    println!("ping: {}", describe(&ping));

    for user in args.users {
        let label = user.to_string();
        let request = CreateUser {
            user,
            rules: Arc::clone(&rules),
        };
        let created = dispatcher.query(&request, &cancel).await?;
        println!("create {label}: {}", describe(&created));
    }

    let deleted = dispatcher.send(&DeleteUser { id: 1 }, &cancel).await?;
    println!("delete 1: {}", describe(&deleted));

    Ok(())
}

fn describe<T: std::fmt::Debug>(outcome: &Outcome<T>) -> String {
    match outcome {
        Outcome::Success(value) => format!("ok {value:?}"),
        Outcome::Failure(error) => format!("failed\n{error}"),
    }
}
