use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use disksync::{ClientConfig, RemoteFile, StatUpdate, SyncFileInfo, SyncOptions};
use disksync_core::{CachedDrive, DiskClient, MediaUpload, ResourceType};
use time::OffsetDateTime;

type Remote = RemoteFile<CachedDrive<DiskClient>>;

#[derive(Debug, Parser)]
#[command(name = "disksync", version, about = "Mirror local files onto a cloud disk")]
struct Cli {
    /// Report what would change without touching the remote side
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Remote directory every path is resolved against
    #[arg(long)]
    root: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Show remote metadata
    Stat { path: String },
    /// List a remote directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Create a remote directory
    Mkdir { path: String },
    /// Upload a local file, creating the remote object when needed
    Push { local: PathBuf, path: String },
    /// Set remote access and modification time to now
    Touch { path: String },
    /// Change the permission bits recorded on a remote object
    Chmod { mode: String, path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut options = SyncOptions::from_env();
    if cli.dry_run {
        options.dry_run = true;
    }
    if let Some(root) = cli.root {
        options.remote_root = root;
    }

    let client = ClientConfig::from_env()?.connect()?;
    let root = options.remote_root.clone();
    let mut remote = RemoteFile::new(CachedDrive::new(client), options, &root);
    run(&mut remote, cli.command).await
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_logging(verbose: u8) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level(verbose)))
        .init();
}

async fn run(remote: &mut Remote, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Stat { path } => stat(remote, &path).await,
        Command::Ls { path } => list(remote, &path).await,
        Command::Mkdir { path } => {
            remote.create_dir(&path).await?;
            Ok(())
        }
        Command::Push { local, path } => push(remote, &local, &path).await,
        Command::Touch { path } => {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            let update = StatUpdate {
                atime: Some(now),
                mtime: Some(now),
                ..StatUpdate::default()
            };
            remote.update_stats(&path, &update).await?;
            Ok(())
        }
        Command::Chmod { mode, path } => chmod(remote, &mode, &path).await,
    }
}

async fn stat(remote: &Remote, path: &str) -> anyhow::Result<()> {
    let info = remote
        .get_info(path)
        .await?
        .with_context(|| format!("no such remote object: {}", remote.get_path(path)))?;
    let stat = info.stat_info();
    println!("path:     {}", info.path);
    println!("type:     {:?}", info.resource_type);
    println!("mime:     {}", info.mime_type);
    println!("size:     {}", info.size);
    if let Some(modified) = info.modified {
        println!("modified: {modified}");
    }
    println!("mode:     {:o}", stat.mode);
    println!("owner:    {}:{}", stat.uid, stat.gid);
    Ok(())
}

async fn list(remote: &Remote, path: &str) -> anyhow::Result<()> {
    let target = remote.get_path(path);
    let items = remote
        .drive()
        .inner()
        .list_directory_all(&target, 100)
        .await?;
    for item in items {
        let marker = match item.resource_type {
            ResourceType::Dir => "/",
            ResourceType::File => "",
        };
        println!("{:>12} {}{marker}", item.size.unwrap_or(0), item.name);
    }
    Ok(())
}

async fn push(remote: &mut Remote, local: &std::path::Path, path: &str) -> anyhow::Result<()> {
    let source = SyncFileInfo::from_local(local)
        .with_context(|| format!("failed to read {}", local.display()))?;
    anyhow::ensure!(
        source.resource_type == ResourceType::File,
        "{} is not a regular file",
        local.display()
    );

    if remote.get_info(path).await?.is_none() {
        remote.create_parent_dirs(path).await?;
        remote.create_file(path, &source).await?;
    }

    let media = MediaUpload::from_path(local, source.mime_type.clone())
        .await
        .with_context(|| format!("failed to open {}", local.display()))?
        .resumable(true);
    remote.update_file(path, &source, media).await?;
    remote
        .update_stats(path, &StatUpdate::from_stat(source.stat_info()))
        .await?;

    if remote.options().dry_run {
        println!("would push {} -> {}", local.display(), remote.get_path(path));
    } else {
        println!(
            "pushed {} -> {} ({} bytes)",
            local.display(),
            remote.get_path(path),
            remote.bytes_written()
        );
    }
    Ok(())
}

async fn chmod(remote: &Remote, mode: &str, path: &str) -> anyhow::Result<()> {
    let permissions = parse_mode(mode)?;
    let info = remote
        .get_info(path)
        .await?
        .with_context(|| format!("no such remote object: {}", remote.get_path(path)))?;
    let update = StatUpdate {
        mode: Some(with_permissions(info.stat_info().mode, permissions)),
        ..StatUpdate::default()
    };
    remote.update_stats(path, &update).await?;
    Ok(())
}

fn parse_mode(mode: &str) -> anyhow::Result<u32> {
    let bits = u32::from_str_radix(mode, 8).with_context(|| format!("invalid octal mode: {mode}"))?;
    anyhow::ensure!(bits <= 0o7777, "mode out of range: {mode}");
    Ok(bits)
}

fn with_permissions(mode: u32, permissions: u32) -> u32 {
    (mode & !0o7777) | permissions
}
