use std::{sync::Arc, time::Duration};

use clap::Parser;
use color_eyre::eyre::bail;
use muster_session::{cache::FileCredentialCache, HttpAuthBackend, Role, SessionControllerBuilder};
use tokio::time;

#[derive(Debug, Parser)]
struct Opts {
    /// The platform API root
    #[arg(short, long, env)]
    api_root: reqwest::Url,

    /// The account email, used when no session can be restored
    #[arg(short, long, env)]
    email: Option<String>,

    /// The account password
    #[arg(short, long, env, hide_env_values = true)]
    password: Option<String>,

    /// The role to sign in under
    #[arg(short, long, env, default_value = "admin")]
    role: Role,

    /// The local file used to persist the credential
    #[arg(
        short = 'f',
        long,
        env,
        name = "FILE",
        default_value = ".muster-credentials.json"
    )]
    credentials_file: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let client = reqwest::Client::builder().https_only(true).build()?;

    let backend = HttpAuthBackend::new(client, opts.api_root);
    let cache = FileCredentialCache::new(opts.credentials_file);

    let controller = SessionControllerBuilder::new(Arc::new(backend), Arc::new(cache)).build();

    let state = controller.bootstrap().await;

    if state.identity.is_none() {
        let (email, password) = match (opts.email, opts.password) {
            (Some(email), Some(password)) => (email, password),
            _ => bail!("no session could be restored and no login credentials were provided"),
        };
        controller.login(opts.role, &email, &password).await?;
    }

    tracing::info!(
        role = controller
            .current_identity()
            .map(|identity| identity.role.as_str())
            .unwrap_or("none"),
        "session ready"
    );

    let mut interval = time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;

        match controller.handle().token() {
            Some(token) => {
                tracing::info!(token = format_args!("{:#?}", token), "session alive");
            }
            None => {
                tracing::warn!("session ended");
                break;
            }
        }
    }

    Ok(())
}
