//! Command-line surface: argument parsing and one handler per subcommand.

pub mod prompt;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::config::Config;
use crate::feedbin::{
    create_subscription, create_unread_entries, delete_subscription, get_feed_entries,
    get_subscription, list_subscriptions, rename_with_suffix, ClientOptions,
    CreateSubscriptionOutcome, CreateUnreadEntriesOutcome, Credentials, DeleteSubscriptionOutcome,
    EntryId, FeedId, FeedbinClient, GetFeedEntriesOutcome, GetSubscriptionOutcome,
    ListSubscriptionsOutcome, ListSubscriptionsParams, RenameOutcome, Subscription,
    SubscriptionId,
};
use crate::notify::Notifications;
use crate::reconcile::Reconciler;
use crate::report;
use crate::secrets::OpCli;
use crate::sheets::{auth, GoogleWorksheet, SheetLayout};
use crate::util::strip_control_chars;

#[derive(Parser, Debug)]
#[command(
    name = "feedbin-tools",
    version,
    about = "Manage Feedbin subscriptions and work through a Google Sheet of feeds to follow"
)]
pub struct Cli {
    /// Config file (default: ~/.config/feedbin-tools/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log planned changes without making them (also: DRY_RUN=true)
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Subscribe to a site or feed URL
    Add {
        url: String,
        /// Offer to mark the feed's backlog unread afterwards
        #[arg(short, long)]
        unread: bool,
        /// Answer yes to every prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List subscriptions
    List {
        /// Only subscriptions created after this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
        /// Request the extended representation
        #[arg(long)]
        extended: bool,
    },
    /// Show one subscription
    Get { id: SubscriptionId },
    /// Append 📖 or 📺 to a subscription's title
    Rename { id: SubscriptionId },
    /// Unsubscribe
    Delete {
        id: SubscriptionId,
        #[arg(short, long)]
        yes: bool,
    },
    /// List a feed's entries
    Entries {
        feed_id: FeedId,
        /// Filter by read state (true/false)
        #[arg(long)]
        read: Option<bool>,
        /// Filter by starred state (true/false)
        #[arg(long)]
        starred: Option<bool>,
    },
    /// Mark entries unread (comma-separated IDs)
    MarkUnread {
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<EntryId>,
    },
    /// Process every row of the wish-list sheet
    Sync {
        /// Send the summary through the channels enabled in [notifications]
        #[arg(long)]
        notify: bool,
    },
}

fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("expected YYYY-MM-DD or RFC 3339, got {value:?}"))
}

/// Shared state for one invocation.
pub struct App {
    pub config: Config,
    pub dry_run: bool,
    store: OpCli,
}

impl App {
    pub fn new(config: Config, dry_run: bool) -> Self {
        let store = OpCli::new(config.secrets.op_binary.clone());
        Self {
            config,
            dry_run,
            store,
        }
    }

    async fn client(&self) -> Result<FeedbinClient> {
        let secrets = &self.config.secrets;
        let credentials = Credentials::resolve(&self.store, &secrets.vault, &secrets.feedbin_item)
            .await
            .context("Failed to read Feedbin credentials")?;
        FeedbinClient::new(credentials, ClientOptions::from(&self.config))
            .context("Failed to build HTTP client")
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Add { url, unread, yes } => self.add(&url, unread, yes).await,
            Command::List { since, extended } => self.list(since, extended).await,
            Command::Get { id } => self.get(id).await,
            Command::Rename { id } => self.rename(id).await,
            Command::Delete { id, yes } => self.delete(id, yes).await,
            Command::Entries {
                feed_id,
                read,
                starred,
            } => self.entries(feed_id, read, starred).await,
            Command::MarkUnread { ids } => self.mark_unread(&ids).await,
            Command::Sync { notify } => self.sync(notify).await,
        }
    }

    async fn add(&self, url: &str, unread: bool, yes: bool) -> Result<()> {
        if !yes && !ask(&format!("🔖 Subscribe to '{url}'?"), true)? {
            println!("👋 Nothing changed.");
            return Ok(());
        }
        if self.dry_run {
            tracing::warn!(url = %url, "Dry run: skipping subscription");
            return Ok(());
        }

        let client = self.client().await?;
        let mut outcome = create_subscription(&client, url).await;

        if let CreateSubscriptionOutcome::MultipleChoices(options) = &outcome {
            let stdin = std::io::stdin();
            let choice = prompt::choose_feed(&mut stdin.lock(), &mut std::io::stdout(), options)?;
            let Some(index) = choice else {
                bail!("🚨 Invalid choice");
            };
            let feed_url = options[index].feed_url.clone();
            tracing::info!(feed_url = %feed_url, "Selected feed URL");
            outcome = create_subscription(&client, &feed_url).await;
        }

        let label = outcome.to_string();
        let subscription = match outcome {
            CreateSubscriptionOutcome::Created(s) | CreateSubscriptionOutcome::Exists(s) => {
                println!(
                    "{label}: '{}' (subscription {}, feed {})",
                    strip_control_chars(&s.title),
                    s.id,
                    s.feed_id
                );
                s
            }
            other @ (CreateSubscriptionOutcome::MultipleChoices(_)
            | CreateSubscriptionOutcome::NotFound
            | CreateSubscriptionOutcome::UnexpectedStatus(_)
            | CreateSubscriptionOutcome::HttpError(_)
            | CreateSubscriptionOutcome::UnexpectedError(_)) => bail!("{other}"),
        };

        if !unread {
            println!("👋 You're all set!");
            return Ok(());
        }

        tracing::info!(feed_id = %subscription.feed_id, "Counting backlog entries");
        let entries = match get_feed_entries(&client, subscription.feed_id, None, None).await {
            GetFeedEntriesOutcome::Ok(entries) => entries,
            other => bail!("{other}"),
        };

        let question = format!(
            "🔖 There are {} backlog entries. Mark all as unread?",
            entries.len()
        );
        if !yes && !ask(&question, true)? {
            println!("👋 You're all set!");
            return Ok(());
        }

        let ids: Vec<EntryId> = entries.iter().map(|e| e.id).collect();
        self.mark_unread_with(&client, &ids).await
    }

    async fn list(&self, since: Option<DateTime<Utc>>, extended: bool) -> Result<()> {
        let client = self.client().await?;
        let params = ListSubscriptionsParams { since, extended };

        match list_subscriptions(&client, &params).await {
            ListSubscriptionsOutcome::Ok(subscriptions) => {
                for subscription in &subscriptions {
                    print_subscription(subscription);
                }
                println!("{} subscriptions", subscriptions.len());
                Ok(())
            }
            other => bail!("{other}"),
        }
    }

    async fn get(&self, id: SubscriptionId) -> Result<()> {
        let client = self.client().await?;
        match get_subscription(&client, id).await {
            GetSubscriptionOutcome::Ok(subscription) => {
                print_subscription(&subscription);
                Ok(())
            }
            other => bail!("{other}"),
        }
    }

    async fn rename(&self, id: SubscriptionId) -> Result<()> {
        if self.dry_run {
            tracing::warn!(subscription_id = %id, "Dry run: skipping rename");
            return Ok(());
        }
        let client = self.client().await?;
        match rename_with_suffix(&client, id).await {
            outcome @ (RenameOutcome::Renamed(_) | RenameOutcome::AlreadySuffixed(_)) => {
                println!("{outcome}");
                Ok(())
            }
            other @ (RenameOutcome::Get(_) | RenameOutcome::Update(_)) => bail!("{other}"),
        }
    }

    async fn delete(&self, id: SubscriptionId, yes: bool) -> Result<()> {
        if !yes && !ask(&format!("🗑️ Delete subscription {id}?"), false)? {
            println!("👋 Nothing changed.");
            return Ok(());
        }
        if self.dry_run {
            tracing::warn!(subscription_id = %id, "Dry run: skipping delete");
            return Ok(());
        }
        let client = self.client().await?;
        match delete_subscription(&client, id).await {
            outcome @ DeleteSubscriptionOutcome::NoContent => {
                println!("{outcome}");
                Ok(())
            }
            other => bail!("{other}"),
        }
    }

    async fn entries(&self, feed_id: FeedId, read: Option<bool>, starred: Option<bool>) -> Result<()> {
        let client = self.client().await?;
        match get_feed_entries(&client, feed_id, read, starred).await {
            GetFeedEntriesOutcome::Ok(entries) => {
                for entry in &entries {
                    let title = entry.title.as_deref().unwrap_or("(untitled)");
                    println!("{}\t{}\t{}", entry.id, strip_control_chars(title), entry.url);
                }
                println!("{} entries", entries.len());
                Ok(())
            }
            other => bail!("{other}"),
        }
    }

    async fn mark_unread(&self, ids: &[EntryId]) -> Result<()> {
        if self.dry_run {
            tracing::warn!(count = ids.len(), "Dry run: skipping mark unread");
            return Ok(());
        }
        let client = self.client().await?;
        self.mark_unread_with(&client, ids).await
    }

    async fn mark_unread_with(&self, client: &FeedbinClient, ids: &[EntryId]) -> Result<()> {
        let outcome = create_unread_entries(client, ids).await;
        match &outcome {
            CreateUnreadEntriesOutcome::Ok(result) => {
                println!("{outcome}");
                if !result.not_marked_as_unread.is_empty() {
                    let ids: Vec<String> =
                        result.not_marked_as_unread.iter().map(ToString::to_string).collect();
                    println!("Not marked: {}", ids.join(", "));
                }
                Ok(())
            }
            CreateUnreadEntriesOutcome::UnexpectedStatus(_)
            | CreateUnreadEntriesOutcome::HttpError(_)
            | CreateUnreadEntriesOutcome::UnexpectedError(_) => bail!("{outcome}"),
        }
    }

    async fn sync(&self, notify: bool) -> Result<()> {
        let sheets = &self.config.sheets;
        if sheets.spreadsheet_id.is_empty() {
            bail!("sheets.spreadsheet_id is not set in the config file");
        }

        let layout = SheetLayout::new(&sheets.status_column, sheets.step_checkboxes)
            .context("Invalid sheets.status_column")?;
        let token = auth::access_token(
            &self.store,
            &self.config.secrets.vault,
            sheets,
            self.config.request_timeout(),
        )
        .await
        .context("Failed to get a Sheets access token")?;
        let worksheet = GoogleWorksheet::new(sheets, token, self.config.request_timeout())
            .context("Failed to build Sheets client")?;
        let client = self.client().await?;

        let reconciler = Reconciler::new(&client, &worksheet, layout, self.dry_run);
        let run = reconciler.run().await.context("Failed to read the wish-list sheet")?;

        print!("{}", report::render_table(&run, std::io::stdout().is_terminal()));

        if notify {
            let notifications = Notifications::from_config(&self.config, &self.store, self.dry_run).await;
            if notifications.is_empty() {
                tracing::warn!("--notify given but no notification channel is enabled");
            }
            notifications.notify(&report::message(&run)).await;
        }
        Ok(())
    }
}

fn ask(question: &str, default: bool) -> Result<bool> {
    let stdin = std::io::stdin();
    prompt::confirm(&mut stdin.lock(), &mut std::io::stdout(), question, default)
        .context("Failed to read answer")
}

fn print_subscription(subscription: &Subscription) {
    println!(
        "{}\tfeed {}\t{}\t{}",
        subscription.id,
        subscription.feed_id,
        strip_control_chars(&subscription.title),
        subscription.feed_url
    );
}
