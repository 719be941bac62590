use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use triage_client::{
    ClientError, NewProfile, PagedSequence, Sample, SelectionOutcome, TriageClient,
    DEFAULT_ROOT_URL,
};
use triage_core::{Phase, ProfileChoice};
use triage_logging::{triage_debug, triage_info, triage_warn};
use url::Url;

use crate::credentials::{self, Credentials};
use crate::prompt::TerminalPrompt;

#[derive(Debug, Parser)]
#[command(name = "triage", version, about = "Command line client for the Triage sandbox")]
pub struct Cli {
    /// Credentials file (defaults to triage.ron in the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store an API token for later commands
    Authenticate {
        token: String,
        /// Root URL of the service
        #[arg(long, default_value = DEFAULT_ROOT_URL)]
        url: String,
        /// Replace existing credentials
        #[arg(long)]
        force: bool,
    },
    #[command(flatten)]
    Service(ServiceCommand),
}

/// Commands that talk to the service with stored credentials.
#[derive(Debug, Subcommand)]
pub enum ServiceCommand {
    /// Submit a file or URL for analysis
    Submit {
        /// Path of a file, or an http(s) URL
        target: String,
        /// Choose files and profiles once static analysis is done
        #[arg(short, long, conflicts_with = "profiles")]
        interactive: bool,
        /// Profile to run; may be repeated
        #[arg(short = 'p', long = "profile")]
        profiles: Vec<String>,
        /// Password of an encrypted archive
        #[arg(long)]
        password: Option<String>,
    },
    /// Choose files and profiles for a sample submitted with -i
    SelectProfile { sample: String },
    /// List your samples, newest first
    List {
        #[arg(short = 'n', long, default_value_t = 20)]
        num: usize,
        /// List public samples instead
        #[arg(long)]
        public: bool,
    },
    /// Search samples, e.g. `family:emotet`
    Search {
        query: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        num: usize,
    },
    /// Follow status changes of one sample, or of all your samples
    Events { sample: Option<String> },
    /// Delete samples
    Delete {
        #[arg(required = true)]
        samples: Vec<String>,
    },
    /// Show the overview, static or task report of a sample
    Report {
        sample: String,
        #[arg(long = "static", conflicts_with = "task")]
        static_report: bool,
        #[arg(short, long)]
        task: Option<String>,
    },
    /// Create an analysis profile
    CreateProfile {
        #[arg(long)]
        name: String,
        /// Comma separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// `internet`, `drop` or empty for the default
        #[arg(long, default_value = "")]
        network: String,
        /// Analysis timeout in seconds
        #[arg(long, default_value_t = 240)]
        timeout: u64,
    },
    /// Delete a profile by id or name
    DeleteProfile { profile: String },
    /// List available profiles
    ListProfiles,
}

/// Delay before an interactive submission is first queried.
const SUBMIT_SETTLE: Duration = Duration::from_secs(2);

pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => credentials::default_path()?,
    };
    triage_debug!("using credentials at {:?}", config_path);

    match cli.command {
        Command::Authenticate { token, url, force } => {
            authenticate(&config_path, &token, &url, force, &cancel).await
        }
        Command::Service(command) => {
            let client = TriageClient::new(credentials::load(&config_path)?.settings())?;
            dispatch(&client, command, &cancel).await
        }
    }
}

async fn dispatch(
    client: &TriageClient,
    command: ServiceCommand,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        ServiceCommand::Submit {
            target,
            interactive,
            profiles,
            password,
        } => {
            submit(
                client,
                &target,
                interactive,
                &profiles,
                password.as_deref(),
                cancel,
            )
            .await
        }
        ServiceCommand::SelectProfile { sample } => select_profile(client, &sample, cancel).await,
        ServiceCommand::List { num, public } => {
            let samples = if public {
                client.public_samples(num, cancel)
            } else {
                client.owned_samples(num, cancel)
            };
            print_samples(client, samples).await
        }
        ServiceCommand::Search { query, num } => {
            print_samples(client, client.search(query, num, cancel)).await
        }
        ServiceCommand::Events { sample } => {
            let mut events = match &sample {
                Some(sample) => client.sample_events(sample, cancel),
                None => client.all_events(cancel),
            };
            while let Some(snapshot) = events.next().await {
                let snapshot = snapshot?;
                println!("{}\t{}\t{}", snapshot.id, snapshot.status, snapshot.target());
            }
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled.into());
            }
            Ok(())
        }
        ServiceCommand::Delete { samples } => {
            for sample in &samples {
                client
                    .delete_sample(sample)
                    .await
                    .with_context(|| format!("deleting {sample}"))?;
                println!("deleted {sample}");
            }
            Ok(())
        }
        ServiceCommand::Report {
            sample,
            static_report,
            task,
        } => report(client, &sample, static_report, task.as_deref()).await,
        ServiceCommand::CreateProfile {
            name,
            tags,
            network,
            timeout,
        } => {
            let profile = client
                .create_profile(&NewProfile {
                    name,
                    tags: tags.into_iter().filter(|tag| !tag.is_empty()).collect(),
                    network,
                    timeout,
                })
                .await?;
            println!("Profile created");
            println!("  ID:   {}", profile.id);
            println!("  Name: {}", profile.name);
            Ok(())
        }
        ServiceCommand::DeleteProfile { profile } => {
            client.delete_profile(&profile).await?;
            println!("deleted profile {profile}");
            Ok(())
        }
        ServiceCommand::ListProfiles => {
            for profile in client.profiles().await? {
                println!("{}", profile.name);
                println!("  timeout: {}s", profile.timeout);
                println!("  network: {}", profile.network);
                println!("  tags: {}", profile.tags.join(", "));
                println!("  id: {}", profile.id);
            }
            Ok(())
        }
    }
}

async fn authenticate(
    path: &Path,
    token: &str,
    url: &str,
    force: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let credentials = Credentials {
        root_url: url.to_string(),
        token: token.to_string(),
    };
    // Reject a bad token before it is stored.
    let client = TriageClient::new(credentials.settings())?;
    client
        .owned_samples(1, cancel)
        .collect_all()
        .await
        .context("token check failed")?;
    credentials::save(path, &credentials, force)?;
    println!("Wrote token to {:?}", path);
    Ok(())
}

async fn submit(
    client: &TriageClient,
    target: &str,
    interactive: bool,
    profiles: &[String],
    password: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let choices: Vec<ProfileChoice> = profiles
        .iter()
        .map(|profile| ProfileChoice {
            profile: profile.clone(),
            pick: String::new(),
        })
        .collect();

    let sample = match web_target(target) {
        Some(url) => {
            if password.is_some() {
                triage_warn!("--password only applies to file submissions; ignored");
            }
            client.submit_url(url.as_str(), interactive, &choices).await?
        }
        None => {
            let path = Path::new(target);
            let contents = std::fs::read(path)
                .with_context(|| format!("{target:?} is neither a readable file nor a URL"))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| target.to_string());
            client
                .submit_file(&file_name, contents, interactive, &choices, password)
                .await?
        }
    };

    println!("Sample submitted");
    println!("  ID:       {}", sample.id);
    println!("  Status:   {}", sample.status);
    match sample.kind.as_str() {
        "url" => println!("  URL:      {}", sample.url),
        _ => println!("  Filename: {}", sample.filename),
    }

    if interactive {
        tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled.into()),
            _ = tokio::time::sleep(SUBMIT_SETTLE) => {}
        }
        select_profile(client, &sample.id, cancel).await?;
    }
    Ok(())
}

fn web_target(target: &str) -> Option<Url> {
    Url::parse(target)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

async fn select_profile(
    client: &TriageClient,
    sample_id: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut selection = client.select_profile(sample_id, TerminalPrompt::stdio(), cancel.clone());
    match selection.run().await? {
        SelectionOutcome::Committed(commit) => {
            triage_info!("selection for {} committed", sample_id);
            if commit.is_automatic() {
                println!("Profiles will be selected automatically");
            } else {
                println!("Profiles selected");
            }
        }
        SelectionOutcome::Skipped { phase } => {
            println!("Sample {sample_id} is already {phase}; no selection needed");
        }
    }
    Ok(())
}

async fn print_samples(client: &TriageClient, mut samples: PagedSequence) -> Result<()> {
    while let Some(sample) = samples.next().await {
        let sample = sample?;
        println!("{}", sample_line(client, &sample).await);
    }
    Ok(())
}

/// `id  score  [families]  target`; the score needs the overview, which only
/// exists once the sample is reported.
async fn sample_line(client: &TriageClient, sample: &Sample) -> String {
    if sample.phase() != Some(Phase::Reported) {
        return format!("{}\tN/A\t{}", sample.id, sample.target());
    }
    match client.overview_report(&sample.id).await {
        Ok(overview) => {
            let analysis = &overview["analysis"];
            let score = analysis["score"].as_i64().unwrap_or_default();
            let families = string_list(&analysis["family"]);
            if families.is_empty() {
                format!("{}\t{}\t{}", sample.id, score, sample.target())
            } else {
                format!(
                    "{}\t{}\t[{}]\t{}",
                    sample.id,
                    score,
                    families.join(" "),
                    sample.target()
                )
            }
        }
        Err(err) => {
            triage_debug!("no overview for {}: {}", sample.id, err);
            format!("{}\t?\t{}", sample.id, sample.target())
        }
    }
}

async fn report(
    client: &TriageClient,
    sample_id: &str,
    static_report: bool,
    task: Option<&str>,
) -> Result<()> {
    if static_report {
        println!("~Static Report~");
        let report = client.static_report(sample_id).await?;
        if report.sample.kind == "url" {
            println!("url: {}", report.sample.target);
        }
        for file in &report.files {
            let selected = if file.selected { " (selected)" } else { "" };
            println!("{}{}", file.name, selected);
            println!("  md5: {}", file.md5);
            println!("  tags: {}", file.tags.join(", "));
            println!("  kind: {}", file.kind);
        }
        return Ok(());
    }

    if let Some(task) = task {
        println!("~{task} Report~");
        let report = client.task_report(sample_id, task).await?;
        fail_on_report_errors(&report)?;
        println!("{}", text(&report["task"]["target"]));
        println!("  md5: {}", text(&report["task"]["md5"]));
        println!("  score: {}", report["analysis"]["score"]);
        println!("  tags: {}", string_list(&report["analysis"]["tags"]).join(", "));
        return Ok(());
    }

    println!("~Overview~");
    let overview = client.overview_report(sample_id).await?;
    fail_on_report_errors(&overview)?;
    let analysis = &overview["analysis"];
    println!("{}", text(&overview["sample"]["target"]));
    println!("  md5: {}", text(&overview["sample"]["md5"]));
    println!("  score: {}", analysis["score"]);
    println!("  family: {}", string_list(&analysis["family"]).join(", "));
    println!("  tags: {}\n", string_list(&analysis["tags"]).join(", "));
    for task in overview["tasks"].as_array().into_iter().flatten() {
        println!("  {}", text(&task["name"]));
        println!("    score: {}", task["score"]);
        if task["kind"].as_str() != Some("static") {
            println!("    platform: {}", text(&task["platform"]));
        }
        println!("    tags: {}", string_list(&task["tags"]).join(", "));
    }
    Ok(())
}

fn fail_on_report_errors(report: &Value) -> Result<()> {
    match report["errors"].as_array() {
        Some(errors) if !errors.is_empty() => {
            bail!("report contains errors: {}", Value::from(errors.clone()))
        }
        _ => Ok(()),
    }
}

fn text(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect()
}
