use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rustvault_core::{
    FileNode, KindFilter, PathUpload, RecordId, Timestamp, UploadBatch, UploadSource,
};
use rustvault_share::{PendingFile, RecipientDirectory};
use rustvault_tree::{SortKey, ViewPreference, DEFAULT_VIEW};
use rustvault_vault::{Permission, TrashedItem, VaultEntry};
use rustvault_workspace::{Restored, VaultWorkspace};
use tracing_subscriber::EnvFilter;

const DEFAULT_DATA_DIR: &str = ".rustvault";

#[derive(Parser)]
#[command(
    name = "rustvault",
    about = "Local file vault with password-gated sharing",
    author,
    version
)]
struct Cli {
    /// 資料目錄；預設為 ./.rustvault。 / Data directory (defaults to ./.rustvault).
    #[arg(long, global = true, value_name = "PATH", env = "RUSTVAULT_HOME")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 瀏覽與整理資料夾樹。 / Browse and organise the folder tree.
    #[command(subcommand)]
    Tree(TreeCommand),
    /// 管理可分享的保險庫條目。 / Manage shareable vault entries.
    #[command(subcommand)]
    Vault(VaultCommand),
    /// 分享檔案給收件者。 / Share files with recipients.
    Share(ShareArgs),
    /// 檢視、還原或清空垃圾桶。 / Inspect, restore or empty the trash.
    #[command(subcommand)]
    Trash(TrashCommand),
    /// 管理下載清單。 / Manage downloaded copies.
    #[command(subcommand)]
    Downloads(DownloadsCommand),
    /// 檢視通知。 / Inspect notifications.
    #[command(subcommand)]
    Notifications(NotificationsCommand),
    /// 監看其他行程對資料目錄的變更。 / Watch the data directory for changes made by other processes.
    Watch(WatchArgs),
}

#[derive(Subcommand)]
enum TreeCommand {
    /// 列出資料夾內容。 / List a folder.
    List(TreeListArgs),
    /// 建立資料夾。 / Create a folder.
    Mkdir {
        /// 資料夾名稱。 / Folder name.
        name: String,
        /// 父資料夾識別碼；預設為根目錄。 / Parent folder id (defaults to the root).
        #[arg(long, value_name = "ID")]
        parent: Option<String>,
    },
    /// 上傳檔案至資料夾。 / Upload files into a folder.
    Upload {
        /// 要上傳的檔案。 / Files to upload.
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
        /// 目標資料夾識別碼；預設為根目錄。 / Target folder id (defaults to the root).
        #[arg(long, value_name = "ID")]
        parent: Option<String>,
    },
    /// 重新命名節點。 / Rename a node.
    Rename {
        id: String,
        /// 新名稱。 / New name.
        name: String,
    },
    /// 加上或移除星號。 / Star or unstar a node.
    Star {
        id: String,
        /// 移除星號。 / Remove the star instead.
        #[arg(long)]
        off: bool,
    },
    /// 將節點移至垃圾桶。 / Move a node (or vault entry) to the trash.
    Delete { id: String },
}

#[derive(Args)]
struct TreeListArgs {
    /// 要列出的資料夾識別碼；預設為根目錄。 / Folder id to list (defaults to the root).
    #[arg(value_name = "ID")]
    parent: Option<String>,
    /// 類型篩選；未指定時沿用上次選擇。 / Kind filter; the last choice for the view is reused when omitted.
    #[arg(long, value_name = "KIND")]
    filter: Option<KindFilter>,
    /// 排序方式；未指定時沿用上次選擇。 / Sort key; the last choice for the view is reused when omitted.
    #[arg(long, value_name = "KEY")]
    sort: Option<SortKey>,
    /// 記住篩選與排序的畫面名稱。 / View name under which filter and sort choices are remembered.
    #[arg(long, default_value = DEFAULT_VIEW)]
    view: String,
}

#[derive(Subcommand)]
enum VaultCommand {
    /// 列出保險庫條目。 / List vault entries.
    List {
        /// 只列出 Shared 資料夾中的條目。 / Only entries in the Shared folder.
        #[arg(long)]
        shared: bool,
    },
    /// 顯示條目詳細資料。 / Show one entry in detail.
    Show { id: String },
    /// 設定或清除分享密碼。 / Set or clear the share password.
    Password {
        id: String,
        /// 新密碼。 / New password.
        #[arg(required_unless_present = "clear")]
        secret: Option<String>,
        /// 清除密碼。 / Clear the password.
        #[arg(long, conflicts_with = "secret")]
        clear: bool,
    },
    /// 驗證密碼。 / Check a password attempt.
    Verify { id: String, attempt: String },
    /// 授權收件者。 / Grant recipients access.
    Grant {
        id: String,
        /// 收件者身分（電子郵件）。 / Recipient identities (e-mail).
        #[arg(required = true, value_name = "RECIPIENT")]
        recipients: Vec<String>,
        /// 授予的權限。 / Permission to grant.
        #[arg(long, value_enum, default_value_t = PermissionChoice::View)]
        permission: PermissionChoice,
    },
    /// 撤銷收件者權限。 / Revoke a recipient's access.
    Revoke { id: String, recipient: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PermissionChoice {
    View,
    Edit,
}

impl From<PermissionChoice> for Permission {
    fn from(choice: PermissionChoice) -> Self {
        match choice {
            PermissionChoice::View => Permission::View,
            PermissionChoice::Edit => Permission::Edit,
        }
    }
}

#[derive(Args)]
struct ShareArgs {
    /// 要上傳並分享的檔案。 / Files to upload and share.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
    /// 要分享的既有條目識別碼。 / Existing vault entry ids to share.
    #[arg(long = "entry", value_name = "ID")]
    entries: Vec<String>,
    /// 收件者身分，可重複指定。 / Recipient identity; may be repeated.
    #[arg(long = "to", value_name = "RECIPIENT")]
    recipients: Vec<String>,
    /// 分享密碼。 / Share password.
    #[arg(long)]
    password: Option<String>,
    /// 授予的權限。 / Permission to grant.
    #[arg(long, value_enum, default_value_t = PermissionChoice::View)]
    permission: PermissionChoice,
}

#[derive(Subcommand)]
enum TrashCommand {
    /// 列出垃圾桶內容。 / List trashed items.
    List,
    /// 還原項目。 / Restore an item.
    Restore { id: String },
    /// 永久刪除單一項目。 / Permanently delete one item.
    Purge { id: String },
    /// 清空垃圾桶。 / Empty the trash.
    Empty,
}

#[derive(Subcommand)]
enum DownloadsCommand {
    /// 列出下載。 / List downloads.
    List,
    /// 下載檔案。 / Download a file or vault entry.
    Add { id: String },
    /// 移除下載。 / Remove a download.
    Remove { id: String },
    /// 清除所有下載。 / Clear every download.
    Clear,
}

#[derive(Subcommand)]
enum NotificationsCommand {
    /// 列出通知（新到舊）。 / List notifications, newest first.
    List {
        /// 只列出未讀通知。 / Unread notifications only.
        #[arg(long)]
        unread: bool,
    },
    /// 標示通知為已讀。 / Mark notifications as read.
    Read {
        /// 通知識別碼。 / Notification id.
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        /// 全部標示為已讀。 / Mark every notification read.
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

#[derive(Args)]
struct WatchArgs {
    /// 最長監看秒數；未指定時持續監看。 / Stop after this many seconds; runs until interrupted when omitted.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
    /// 收到第一個變更後結束。 / Exit after the first change.
    #[arg(long)]
    once: bool,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let Cli { data_dir, command } = Cli::parse();
    let root = data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let mut workspace = VaultWorkspace::open(&root)
        .with_context(|| format!("failed to open data directory {}", root.display()))?;

    let result = match command {
        Commands::Tree(command) => execute_tree_command(command, &mut workspace),
        Commands::Vault(command) => execute_vault_command(command, &mut workspace),
        Commands::Share(args) => execute_share(args, &mut workspace),
        Commands::Trash(command) => execute_trash_command(command, &mut workspace),
        Commands::Downloads(command) => execute_downloads_command(command, &mut workspace),
        Commands::Notifications(command) => {
            execute_notifications_command(command, &mut workspace)
        }
        Commands::Watch(args) => execute_watch(args, &mut workspace),
    };
    for warning in workspace.take_warnings() {
        eprintln!("Warning: {warning}");
    }
    result
}

fn execute_tree_command(command: TreeCommand, workspace: &mut VaultWorkspace) -> Result<()> {
    match command {
        TreeCommand::List(args) => list_tree(args, workspace),
        TreeCommand::Mkdir { name, parent } => {
            let parent = parent.map(RecordId::from_string);
            let folder = workspace
                .tree_mut()
                .create_folder(parent.as_ref(), &name)?;
            println!("Created folder '{}' ({})", folder.name, folder.id);
            Ok(())
        }
        TreeCommand::Upload { files, parent } => {
            let parent = parent.map(RecordId::from_string);
            let sources: Vec<PathUpload> = files.iter().map(PathUpload::new).collect();
            let report = workspace.upload(
                parent.as_ref(),
                sources.iter().map(|source| source as &dyn UploadSource),
            )?;
            for failure in &report.failures {
                eprintln!("Skipped: {failure}");
            }
            if report.nodes.is_empty() {
                bail!("no files could be read");
            }
            for node in &report.nodes {
                println!("Uploaded '{}' ({})", node.name, node.id);
            }
            Ok(())
        }
        TreeCommand::Rename { id, name } => {
            let id = RecordId::from_string(id);
            workspace.tree_mut().rename(&id, &name)?;
            println!("Renamed {id} to '{}'", name.trim());
            Ok(())
        }
        TreeCommand::Star { id, off } => {
            let id = RecordId::from_string(id);
            workspace.tree_mut().set_starred(&id, !off)?;
            println!("{} {id}", if off { "Unstarred" } else { "Starred" });
            Ok(())
        }
        TreeCommand::Delete { id } => {
            let trashed = workspace.delete(&RecordId::from_string(id))?;
            println!("Moved '{}' to trash", trashed.item.name());
            Ok(())
        }
    }
}

fn list_tree(args: TreeListArgs, workspace: &mut VaultWorkspace) -> Result<()> {
    let stored = workspace.preferences().view(&args.view);
    let preference = ViewPreference {
        filter: args.filter.unwrap_or(stored.filter),
        sort: args.sort.unwrap_or(stored.sort),
    };
    workspace
        .preferences_mut()
        .set_view(&args.view, preference);

    let parent = args.parent.map(RecordId::from_string);
    let nodes = workspace.list(parent.as_ref(), preference.filter, preference.sort)?;
    let trail = workspace
        .tree()
        .breadcrumbs(parent.as_ref().unwrap_or(&RecordId::root()))?;
    let trail: Vec<_> = trail.into_iter().map(|crumb| crumb.name).collect();
    println!(
        "{} [{} / {}]",
        trail.join(" / "),
        preference.filter.label(),
        preference.sort
    );
    for node in &nodes {
        println!("{}", format_node(node));
    }
    Ok(())
}

fn format_node(node: &FileNode) -> String {
    let marker = if node.starred { "*" } else { " " };
    let size = if node.is_folder() {
        format!("{} items", node.children.len())
    } else {
        node.size.to_string()
    };
    format!(
        "{marker} {:<24} {:<12} {:>10}  {}  {}",
        node.id.as_str(),
        node.kind.as_str(),
        size,
        format_time(node.last_modified),
        node.name
    )
}

fn format_time(timestamp: Timestamp) -> String {
    timestamp.format("%Y-%m-%d %H:%M").to_string()
}

fn execute_vault_command(command: VaultCommand, workspace: &mut VaultWorkspace) -> Result<()> {
    match command {
        VaultCommand::List { shared } => {
            let entries: Vec<&VaultEntry> = if shared {
                workspace
                    .vault()
                    .query(VaultEntry::is_shared_folder_member)
                    .collect()
            } else {
                workspace.vault().active().collect()
            };
            if entries.is_empty() {
                println!("No vault entries");
            }
            for entry in entries {
                println!(
                    "{:<24} {:<12} {:>10}  {}  {} recipient(s)  {}",
                    entry.id.as_str(),
                    entry.kind.as_str(),
                    entry.size.display(),
                    if entry.has_password { "locked" } else { "open  " },
                    entry.shared_with.len(),
                    entry.name
                );
            }
            Ok(())
        }
        VaultCommand::Show { id } => {
            let id = RecordId::from_string(id);
            let entry = workspace
                .vault()
                .get(&id)
                .ok_or_else(|| anyhow!("vault entry {id} not found"))?;
            println!("id:        {}", entry.id);
            println!("name:      {}", entry.name);
            println!("kind:      {}", entry.kind);
            println!("size:      {} ({} bytes)", entry.size, entry.size.bytes());
            println!("created:   {}", format_time(entry.created_at));
            println!("modified:  {}", format_time(entry.last_modified()));
            println!("folder:    {}", entry.folder.as_deref().unwrap_or("-"));
            println!("starred:   {}", entry.starred);
            println!("password:  {}", entry.has_password);
            for grant in &entry.shared_with {
                let name = if grant.display_name.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", grant.display_name)
                };
                println!("shared:    {}{name} [{}]", grant.recipient, grant.permission);
            }
            Ok(())
        }
        VaultCommand::Password { id, secret, clear } => {
            let id = RecordId::from_string(id);
            let secret = if clear { None } else { secret };
            let entry = workspace.vault_mut().set_password(&id, secret.as_deref())?;
            if entry.has_password {
                println!("Password set for '{}'", entry.name);
            } else {
                println!("Password cleared for '{}'", entry.name);
            }
            Ok(())
        }
        VaultCommand::Verify { id, attempt } => {
            let id = RecordId::from_string(id);
            if workspace.vault().verify_password(&id, &attempt)? {
                println!("Password accepted");
                Ok(())
            } else {
                bail!("password rejected")
            }
        }
        VaultCommand::Grant {
            id,
            recipients,
            permission,
        } => {
            let id = RecordId::from_string(id);
            let directory = load_directory(workspace)?;
            let grants: Vec<_> = recipients
                .iter()
                .map(|recipient| directory.grant_for(recipient, permission.into()))
                .collect();
            let entry = workspace.vault_mut().grant_access(&id, grants)?;
            println!(
                "'{}' is shared with {} recipient(s)",
                entry.name,
                entry.shared_with.len()
            );
            Ok(())
        }
        VaultCommand::Revoke { id, recipient } => {
            let id = RecordId::from_string(id);
            if workspace.vault_mut().revoke_access(&id, &recipient)? {
                println!("Revoked access for {recipient}");
            } else {
                println!("{recipient} had no access");
            }
            Ok(())
        }
    }
}

fn execute_share(args: ShareArgs, workspace: &mut VaultWorkspace) -> Result<()> {
    let directory = load_directory(workspace)?;
    let mut gate = workspace.sharing_gate();

    let sources: Vec<PathUpload> = args.files.iter().map(PathUpload::new).collect();
    let batch = UploadBatch::read(sources.iter().map(|source| source as &dyn UploadSource));
    for failure in &batch.failures {
        eprintln!("Skipped: {failure}");
    }
    gate.add_files(batch.files)?;

    let mut existing = Vec::with_capacity(args.entries.len());
    for id in args.entries {
        let id = RecordId::from_string(id);
        let entry = workspace
            .vault()
            .get(&id)
            .ok_or_else(|| anyhow!("vault entry {id} not found"))?;
        existing.push(PendingFile::existing(entry));
    }
    gate.add_files(existing)?;

    if let Some(password) = &args.password {
        gate.request_password()?;
        gate.submit_password(password)?;
    }
    for recipient in &args.recipients {
        gate.select_recipient(directory.grant_for(recipient, args.permission.into()))?;
    }

    let receipt = workspace.confirm_share(&mut gate)?;
    for artifact in &receipt.artifacts {
        let lock = if artifact.password_protected {
            " [password]"
        } else {
            ""
        };
        println!(
            "Shared '{}' ({}){lock}",
            artifact.display_name, artifact.entry_id
        );
    }
    println!(
        "{} file(s) shared with {} recipient(s)",
        receipt.artifacts.len(),
        receipt.recipients.len()
    );
    Ok(())
}

fn load_directory(workspace: &VaultWorkspace) -> Result<RecipientDirectory> {
    workspace
        .recipients()
        .context("failed to load recipient directory")
}

fn execute_trash_command(command: TrashCommand, workspace: &mut VaultWorkspace) -> Result<()> {
    match command {
        TrashCommand::List => {
            if workspace.trash().is_empty() {
                println!("Trash is empty");
            }
            for trashed in workspace.trash().entries() {
                let source = match &trashed.item {
                    TrashedItem::Entry { .. } => "vault",
                    TrashedItem::Node { .. } => "tree",
                };
                println!(
                    "{:<24} {:<6} {:>10}  {}  {}",
                    trashed.id.as_str(),
                    source,
                    trashed.item.size().display(),
                    format_time(trashed.deleted_at),
                    trashed.item.name()
                );
            }
            Ok(())
        }
        TrashCommand::Restore { id } => {
            match workspace.restore(&RecordId::from_string(id))? {
                Restored::Entry(entry) => println!("Restored '{}' to the vault", entry.name),
                Restored::Node { node, parent } => {
                    println!("Restored '{}' into folder {parent}", node.name)
                }
            }
            Ok(())
        }
        TrashCommand::Purge { id } => {
            let id = RecordId::from_string(id);
            if workspace.purge(&id) {
                println!("Permanently deleted {id}");
            } else {
                println!("Nothing to purge for {id}");
            }
            Ok(())
        }
        TrashCommand::Empty => {
            let count = workspace.empty_trash();
            println!("Permanently deleted {count} item(s)");
            Ok(())
        }
    }
}

fn execute_downloads_command(
    command: DownloadsCommand,
    workspace: &mut VaultWorkspace,
) -> Result<()> {
    match command {
        DownloadsCommand::List => {
            if workspace.downloads().entries().is_empty() {
                println!("No downloads");
            }
            for download in workspace.downloads().entries() {
                println!(
                    "{:<24} {:<12} {:>10}  {}  {}",
                    download.id.as_str(),
                    download.kind.as_str(),
                    download.size.display(),
                    format_time(download.added_at),
                    download.name
                );
            }
            Ok(())
        }
        DownloadsCommand::Add { id } => {
            let download = workspace.download(&RecordId::from_string(id))?;
            println!("Downloaded '{}' ({})", download.name, download.id);
            Ok(())
        }
        DownloadsCommand::Remove { id } => {
            let id = RecordId::from_string(id);
            if !workspace.downloads_mut().remove(&id) {
                bail!("download {id} not found");
            }
            println!("Removed download {id}");
            Ok(())
        }
        DownloadsCommand::Clear => {
            let count = workspace.downloads_mut().clear();
            println!("Cleared {count} download(s)");
            Ok(())
        }
    }
}

fn execute_notifications_command(
    command: NotificationsCommand,
    workspace: &mut VaultWorkspace,
) -> Result<()> {
    match command {
        NotificationsCommand::List { unread } => {
            let log = workspace.notifications();
            let mut printed = 0;
            for event in log.recent().filter(|event| !unread || !event.read) {
                println!(
                    "{} {:<24} {:<16} {}  {}: {}",
                    if event.read { " " } else { "•" },
                    event.id.as_str(),
                    event.category.as_str(),
                    format_time(event.created_at),
                    event.title,
                    event.description
                );
                printed += 1;
            }
            if printed == 0 {
                println!("No notifications");
            }
            Ok(())
        }
        NotificationsCommand::Read { id, all } => {
            if all {
                let count = workspace.notifications_mut().mark_all_read();
                println!("Marked {count} notification(s) read");
            } else if let Some(id) = id {
                let id = RecordId::from_string(id);
                workspace.notifications_mut().mark_read(&id)?;
                println!("Marked {id} read");
            }
            Ok(())
        }
    }
}

fn execute_watch(args: WatchArgs, workspace: &mut VaultWorkspace) -> Result<()> {
    workspace.watch()?;
    println!("Watching {}", workspace.layout().root().display());
    let deadline = args
        .timeout
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        let slice = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(());
                }
                remaining.min(Duration::from_secs(1))
            }
            None => Duration::from_secs(1),
        };
        let changed = workspace.wait_external(slice);
        for key in &changed {
            println!("changed: {key}");
        }
        if args.once && !changed.is_empty() {
            return Ok(());
        }
    }
}
