use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{debug, info};
use std::fs;
use webhook_gc::cleaner::{CleanerConfig, clean_bucket, expiry_cutoff, preview_bucket};
use webhook_gc::config::{
    APPWRITE_BUCKET_ID, APPWRITE_ENDPOINT, APPWRITE_PROJECT_ID, GITHUB_WEBHOOK_SECRET,
    RETENTION_PERIOD_DAYS, StorageEndpoint, parse_retention_days,
};
use webhook_gc::signature::{sign, verify_signature};
use webhook_gc::storage::AppwriteStorage;
use webhook_gc::{APP_NAME, set_up_logger};

fn command() -> Command {
    let secret = Arg::new("secret")
        .short('s')
        .long("secret")
        .required(true)
        .env(GITHUB_WEBHOOK_SECRET)
        .hide_env_values(true)
        .help("Shared webhook secret.");

    let file = Arg::new("file")
        .required(true)
        .help("File holding the exact payload bytes.");

    Command::new("webhook-gc")
        .version("0.1")
        .author("Jacob Luszcz")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Verbose mode. Outputs DEBUG and higher log messages."),
        )
        .subcommand(
            Command::new("sign")
                .about("Prints the X-Hub-Signature-256 value for a payload.")
                .arg(secret.clone())
                .arg(file.clone()),
        )
        .subcommand(
            Command::new("verify")
                .about("Checks a payload against an X-Hub-Signature-256 value.")
                .arg(secret)
                .arg(
                    Arg::new("signature")
                        .long("signature")
                        .required(true)
                        .help("Signature header value, e.g. sha256=..."),
                )
                .arg(file),
        )
        .subcommand(
            Command::new("clean")
                .about("Deletes files older than the retention period from a bucket.")
                .arg(
                    Arg::new("bucket")
                        .short('b')
                        .long("bucket")
                        .required(true)
                        .env(APPWRITE_BUCKET_ID)
                        .help("Bucket to clean."),
                )
                .arg(
                    Arg::new("retention-days")
                        .short('r')
                        .long("retention-days")
                        .required(true)
                        .env(RETENTION_PERIOD_DAYS)
                        .help("Files older than this many days are deleted."),
                )
                .arg(
                    Arg::new("api-key")
                        .short('k')
                        .long("api-key")
                        .required(true)
                        .env("APPWRITE_API_KEY")
                        .hide_env_values(true)
                        .help("Storage API key."),
                )
                .arg(
                    Arg::new("endpoint")
                        .long("endpoint")
                        .required(true)
                        .env(APPWRITE_ENDPOINT)
                        .help("Storage API endpoint."),
                )
                .arg(
                    Arg::new("project")
                        .long("project")
                        .required(true)
                        .env(APPWRITE_PROJECT_ID)
                        .help("Storage project ID."),
                )
                .arg(
                    Arg::new("concurrency")
                        .short('c')
                        .long("concurrency")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10")
                        .help("Maximum number of deletions in flight."),
                )
                .arg(
                    Arg::new("dryrun")
                        .short('d')
                        .long("dryrun")
                        .alias("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Lists the first page of expired files without deleting them."),
                ),
        )
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{id} is required"))
}

fn read_payload(matches: &ArgMatches) -> Result<Vec<u8>> {
    let path = required(matches, "file")?;
    fs::read(path).with_context(|| format!("Failed to read {path}"))
}

fn run_sign(matches: &ArgMatches) -> Result<()> {
    let secret = required(matches, "secret")?;
    let payload = read_payload(matches)?;

    let signature = sign(secret.as_bytes(), &payload).map_err(|e| anyhow!("{e}"))?;
    println!("{signature}");
    Ok(())
}

fn run_verify(matches: &ArgMatches) -> Result<()> {
    let secret = required(matches, "secret")?;
    let signature = required(matches, "signature")?;
    let payload = read_payload(matches)?;

    if verify_signature(secret.as_bytes(), &payload, Some(signature)) {
        info!("Signature is valid");
        Ok(())
    } else {
        bail!("Invalid signature")
    }
}

async fn run_clean(matches: &ArgMatches) -> Result<()> {
    let bucket_id = required(matches, "bucket")?;
    let retention_days = parse_retention_days(required(matches, "retention-days")?)?;
    let endpoint = StorageEndpoint {
        endpoint: required(matches, "endpoint")?.to_string(),
        project_id: required(matches, "project")?.to_string(),
    };
    let config = CleanerConfig {
        concurrency_limit: matches.get_one::<usize>("concurrency").copied().unwrap_or(10),
        ..CleanerConfig::default()
    };

    let storage = AppwriteStorage::new(&endpoint, required(matches, "api-key")?)?;
    let cutoff = expiry_cutoff(Utc::now(), retention_days.get())?;

    if matches.get_flag("dryrun") {
        preview_bucket(&storage, bucket_id, cutoff, &config).await?;
    } else {
        clean_bucket(&storage, bucket_id, cutoff, &config).await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = command().get_matches();
    set_up_logger(APP_NAME, module_path!(), matches.get_flag("verbose"))?;
    debug!("{matches:?}");

    match matches.subcommand() {
        Some(("sign", sub)) => run_sign(sub),
        Some(("verify", sub)) => run_verify(sub),
        Some(("clean", sub)) => run_clean(sub).await,
        Some((name, _)) => bail!("Unknown command: {name}"),
        None => bail!("A command is required"),
    }
}
