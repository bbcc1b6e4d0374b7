use clap::Parser;
use hfs_client::core::paths;
use hfs_client::core::ConfigProvider;
use hfs_client::utils::progress::make_progress_bar;
use hfs_client::utils::{logger, validation::Validate};
use hfs_client::{
    CliConfig, Command, HfsClient, HfsError, ProgressFactory, SessionFile, TomlConfig,
    UploadSummary,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 載入配置（日誌還沒初始化，錯誤直接印到 stderr）
    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if cli.json_logs || config.json_logs() {
        logger::init_json_logger(cli.verbose, config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, config.log_level());
    }

    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&cli, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: &CliConfig, config: &TomlConfig) -> hfs_client::Result<()> {
    let client = HfsClient::from_config(config)?;
    let session_file = config.session_file();

    match &cli.command {
        Command::Login => {
            login(&client, config).await?;
            println!("✅ Logged in to {}", client);
            return Ok(());
        }
        Command::Logout => {
            SessionFile::delete(session_file)?;
            println!("👋 Session removed");
            return Ok(());
        }
        _ => restore_session(&client, config).await?,
    }

    match &cli.command {
        Command::Login | Command::Logout => {}
        Command::Cookies => {
            for (name, value) in client.cookie_jar().to_map() {
                println!("{}={}", name, value);
            }
        }
        Command::Ls { path, permissions } => {
            let listing = client.list_with_permissions(path).await?;
            for entry in &listing.entries {
                println!("{}", entry);
            }
            if *permissions {
                let p = &listing.permissions;
                println!(
                    "upload={} delete={} overwrite={} archive={} comment={}",
                    p.can_upload, p.can_delete, p.can_overwrite, p.can_archive, p.can_comment
                );
            }
        }
        Command::Exists { path } => {
            let exists = client.exists(path).await?;
            println!("{}", exists);
            if !exists {
                std::process::exit(4);
            }
        }
        Command::Mkdir { path, parents } => {
            if *parents {
                let created = client.create_folders(path, "/").await?;
                println!("📁 {} ({} created)", paths::normalize(path), created);
            } else {
                let (parent, name) = paths::split_parent(path);
                client.create_folder(&name, &parent).await?;
                println!("📁 {}", paths::normalize(path));
            }
        }
        Command::Rm { path, force } => {
            let force = *force || (paths::is_root(path) && confirm_root_delete(path)?);
            if paths::is_root(path) && !force {
                println!("Aborted");
                return Ok(());
            }
            client.delete(path, force).await?;
            println!("🗑️ {}", path);
        }
        Command::Upload {
            local,
            remote,
            existing,
            no_progress,
        } => {
            let existing = existing.unwrap_or_else(|| config.upload_mode());
            let progress = if *no_progress {
                None
            } else {
                let factory: ProgressFactory = Arc::new(|_name: &str| make_progress_bar());
                Some(factory)
            };

            match client.upload(local, remote, existing, progress).await? {
                UploadSummary::File(receipt) => {
                    println!(
                        "⬆️ {} -> {} ({:?}, {} bytes)",
                        receipt.local_path, receipt.remote_path, receipt.status, receipt.bytes
                    );
                }
                UploadSummary::Folder(report) => {
                    println!(
                        "📊 {}: {} uploaded ({} bytes), {} skipped, {} failed",
                        report.remote_root,
                        report.uploaded.len(),
                        report.total_bytes(),
                        report.skipped.len(),
                        report.failed.len() + report.failed_folders.len()
                    );
                    for failure in &report.failed {
                        eprintln!("  ⚠️ {}: {}", failure.remote_path, failure.reason);
                    }
                    for failure in &report.failed_folders {
                        eprintln!("  ⚠️ {}/: {}", failure.remote_path, failure.reason);
                    }
                    if !report.is_success() {
                        std::process::exit(2);
                    }
                }
            }
        }
        Command::Download {
            remote,
            local,
            no_progress,
        } => {
            let local = local
                .clone()
                .unwrap_or_else(|| PathBuf::from(paths::split_parent(remote).1));
            let progress = if *no_progress {
                None
            } else {
                Some(make_progress_bar())
            };
            let receipt = client.download_file(remote, &local, progress).await?;
            println!(
                "⬇️ {} -> {} ({} bytes)",
                receipt.remote_path, receipt.local_path, receipt.bytes
            );
        }
        Command::Rename { path, new_name } => {
            client.rename(path, new_name).await?;
            println!("✏️ {} -> {}", path, new_name);
        }
        Command::Mv { paths: all } => {
            if let Some((dest, sources)) = all.split_last() {
                let sources: Vec<&str> = sources.iter().map(String::as_str).collect();
                client.move_paths(&sources, dest).await?;
                println!("📦 {} item(s) -> {}", sources.len(), dest);
            }
        }
    }

    Ok(())
}

async fn login(client: &HfsClient, config: &TomlConfig) -> hfs_client::Result<()> {
    let username = config.username().ok_or_else(|| HfsError::MissingConfigError {
        field: "auth.username (--user)".to_string(),
    })?;
    let password = config.password().ok_or_else(|| HfsError::MissingConfigError {
        field: "auth.password (--password or $HFS_PASSWORD)".to_string(),
    })?;

    client.authorize(username, password).await?;

    if config.persist_session() {
        SessionFile::new(config.server_url(), client.cookie_jar()).save(config.session_file())?;
        tracing::info!("💾 Session saved to {}", config.session_file());
    }
    Ok(())
}

/// 優先使用已保存的 session，沒有的話用設定中的帳密登入
async fn restore_session(client: &HfsClient, config: &TomlConfig) -> hfs_client::Result<()> {
    if let Some(session) = SessionFile::load_for(config.session_file(), config.server_url())? {
        tracing::debug!("Restored session from {}", config.session_file());
        client.set_cookie_jar(session.cookies);
        return Ok(());
    }

    if config.username().is_some() && config.password().is_some() {
        login(client, config).await?;
    } else {
        tracing::debug!("No session and no credentials; continuing anonymously");
    }
    Ok(())
}

fn confirm_root_delete(path: &str) -> hfs_client::Result<bool> {
    print!("are you sure you want to delete \"{}\"? (y/[n]) ", path);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
