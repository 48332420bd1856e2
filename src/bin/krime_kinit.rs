use clap::Parser;
use der::DateTime;
use libkrime_as::client::{AsClient, AsCredentials, ExchangeOptions};
use libkrime_as::config::{ConfigSources, ENV_CONFIG, ENV_KDC, ENV_REALM};
use libkrime_as::error::KrbError;
use libkrime_as::proto::Name;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::SystemTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Parser)]
#[clap(about = "Krime Kinit - Obtain a TGT, If You Please")]
struct OptParser {
    /// The client principal, as `name` or `name@REALM`.
    principal: String,
    #[clap(long, env = ENV_REALM)]
    realm: Option<String>,
    #[clap(long, env = ENV_KDC)]
    kdc: Option<String>,
    #[clap(long, env = ENV_CONFIG)]
    config: Option<PathBuf>,
    /// A TOML file of exchange options.
    #[clap(long)]
    options: Option<PathBuf>,
    /// Read the password from this environment variable instead of stdin.
    #[clap(long)]
    password_env: Option<String>,
}

async fn read_password_from<R>(reader: &mut R) -> Result<String, KrbError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn read_password(password_env: Option<&str>) -> Result<String, KrbError> {
    if let Some(var) = password_env {
        return std::env::var(var).map_err(|err| {
            error!(?err, var, "unable to read password from environment");
            KrbError::InvalidPassphrase
        });
    }

    read_password_from(&mut BufReader::new(tokio::io::stdin())).await
}

fn display_time(time: SystemTime) -> String {
    DateTime::from_system_time(time)
        .map(|dt| dt.to_string())
        .unwrap_or_else(|_| "<out of range>".to_string())
}

fn print_credentials(creds: &AsCredentials) {
    let part = creds.reply_part();

    println!("Client:        {}", creds.name());
    println!("Service:       {}", creds.ticket().service());
    println!("Auth time:     {}", display_time(part.auth_time()));
    println!("Start time:    {}", display_time(part.start_time()));
    println!("End time:      {}", display_time(part.end_time()));
    if let Some(renew_until) = part.renew_until() {
        println!("Renew until:   {}", display_time(renew_until));
    }
    println!("Flags:         {:?}", part.flags());
    if let Ok(etype) = creds.session_key().etype() {
        println!("Session etype: {:?}", etype);
    }
}

async fn main_run(opt: OptParser) -> Result<(), KrbError> {
    let mut sources = ConfigSources::from_env();
    sources.realm = opt.realm;
    sources.kdc = opt.kdc;
    sources.config_path = opt.config;

    let options = match &opt.options {
        Some(path) => ExchangeOptions::parse(path)?,
        None => ExchangeOptions::default(),
    };

    let client = AsClient::from_sources(&sources, options)?;

    let principal = if opt.principal.contains('@') {
        Name::from_str(&opt.principal)?
    } else {
        Name::from_str(&format!("{}@{}", opt.principal, client.config().realm()))?
    };
    debug!(%principal, kdc = %client.config().kdc());

    let password = read_password(opt.password_env.as_deref()).await?;

    let creds = client.authenticate(&principal, &password).await?;
    print_credentials(&creds);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let opt = OptParser::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match main_run(opt).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = ?err.kind(), "{}", err);
            ExitCode::FAILURE
        }
    }
}
