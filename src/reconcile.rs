//! Drives wish-list rows through subscribe -> mark backlog unread -> add suffix.
//!
//! Each row carries its own progress in the sheet, so a run can stop anywhere
//! and the next one resumes from the written status. Rows are handled one at a
//! time and every step is written back before the next one starts.

use crate::feedbin::{
    create_subscription, create_unread_entries, get_feed_entries, rename_with_suffix,
    CreateSubscriptionOutcome, CreateUnreadEntriesOutcome, FeedbinClient, GetFeedEntriesOutcome,
    GetSubscriptionOutcome, RenameOutcome, UpdateSubscriptionOutcome,
};
use crate::sheets::{parse_rows, Row, RowParseError, SheetError, SheetLayout, Status, Step, Worksheet};

/// Upper bound on steps per row per run (one per forward transition).
const MAX_STEPS_PER_ROW: usize = 3;

/// What happened during one run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Every valid row in sheet order, with its final state.
    pub rows: Vec<Row>,
    pub invalid: Vec<RowParseError>,
    pub write_failures: usize,
    pub dry_run: bool,
}

impl RunReport {
    pub fn count(&self, status: Status) -> usize {
        self.rows.iter().filter(|row| row.status == status).count()
    }

    pub fn needs_attention(&self) -> bool {
        !self.invalid.is_empty()
            || self.write_failures > 0
            || self.rows.iter().any(|row| row.status.needs_attention())
    }
}

pub struct Reconciler<'a> {
    client: &'a FeedbinClient,
    sheet: &'a dyn Worksheet,
    layout: SheetLayout,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        client: &'a FeedbinClient,
        sheet: &'a dyn Worksheet,
        layout: SheetLayout,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            sheet,
            layout,
            dry_run,
        }
    }

    /// Reads the sheet, processes every valid row and reports the outcome.
    ///
    /// Only reading or parsing the sheet fails the run; per-row failures end up
    /// in the rows themselves.
    pub async fn run(&self) -> Result<RunReport, SheetError> {
        let values = self.sheet.read_values().await?;
        let parsed = parse_rows(&values)?;
        tracing::info!(
            rows = parsed.rows.len(),
            invalid = parsed.invalid.len(),
            dry_run = self.dry_run,
            "Read wish list"
        );

        let mut report = self.process_rows(parsed.rows).await;
        report.invalid = parsed.invalid;
        Ok(report)
    }

    pub async fn process_rows(&self, rows: Vec<Row>) -> RunReport {
        let mut report = RunReport {
            dry_run: self.dry_run,
            ..RunReport::default()
        };

        for row in rows {
            let row = self.process_row(row, &mut report.write_failures).await;
            report.rows.push(row);
        }

        tracing::info!(
            rows = report.rows.len(),
            done = report.count(Status::SuffixAdded),
            errors = report.count(Status::Error),
            write_failures = report.write_failures,
            "Finished processing rows"
        );
        report
    }

    /// Advances one row while each step lands on an intermediate status.
    async fn process_row(&self, mut row: Row, write_failures: &mut usize) -> Row {
        for _ in 0..MAX_STEPS_PER_ROW {
            let Some(step) = row.next_step() else {
                tracing::debug!(row = row.index, status = %row.status, "Nothing to do");
                break;
            };

            if self.dry_run {
                tracing::info!(row = row.index, url = %row.url, step = %step, "Dry run: would run step");
                break;
            }

            row = self.apply_step(row, step).await;
            tracing::info!(row = row.index, url = %row.url, step = %step, status = %row.status, "Step finished");

            if !self.write_back(&row).await {
                *write_failures += 1;
            }

            if !matches!(row.status, Status::Subscribed | Status::BacklogUnread) {
                break;
            }
        }
        row
    }

    /// Runs one step and returns the row with its new status, ids and details.
    pub async fn apply_step(&self, row: Row, step: Step) -> Row {
        match step {
            Step::Subscribe => self.subscribe(row).await,
            Step::MarkBacklogUnread => self.mark_backlog_unread(row).await,
            Step::AddSuffix => self.add_suffix(row).await,
        }
    }

    async fn subscribe(&self, mut row: Row) -> Row {
        let outcome = create_subscription(self.client, &row.url).await;
        let details = outcome.to_string();

        match outcome {
            CreateSubscriptionOutcome::Created(subscription)
            | CreateSubscriptionOutcome::Exists(subscription) => {
                row.subscription_id = Some(subscription.id);
                row.feed_id = Some(subscription.feed_id);
                row.with_status(Status::Subscribed, "")
            }
            CreateSubscriptionOutcome::MultipleChoices(_) => {
                row.with_status(Status::MultipleChoices, details)
            }
            CreateSubscriptionOutcome::NotFound => row.with_status(Status::NotFound, details),
            CreateSubscriptionOutcome::UnexpectedStatus(_)
            | CreateSubscriptionOutcome::HttpError(_)
            | CreateSubscriptionOutcome::UnexpectedError(_) => {
                tracing::error!(row = row.index, url = %row.url, details = %details, "Subscribe failed");
                row.failed(Step::Subscribe, details)
            }
        }
    }

    async fn mark_backlog_unread(&self, row: Row) -> Row {
        let Some(feed_id) = row.feed_id else {
            tracing::error!(row = row.index, "Cannot mark backlog unread without a feed ID");
            return row.failed(Step::MarkBacklogUnread, "🚨 Missing feed ID");
        };

        let entries = match get_feed_entries(self.client, feed_id, None, None).await {
            GetFeedEntriesOutcome::Ok(entries) => entries,
            outcome @ (GetFeedEntriesOutcome::Forbidden(_)
            | GetFeedEntriesOutcome::NotFound(_)
            | GetFeedEntriesOutcome::HttpError(_)
            | GetFeedEntriesOutcome::UnexpectedError(_)) => {
                tracing::error!(row = row.index, feed_id = %feed_id, outcome = %outcome, "Listing entries failed");
                return row.failed(Step::MarkBacklogUnread, outcome);
            }
        };

        let entry_ids: Vec<_> = entries.iter().map(|entry| entry.id).collect();
        let outcome = create_unread_entries(self.client, &entry_ids).await;
        let details = outcome.to_string();

        match outcome {
            CreateUnreadEntriesOutcome::Ok(_) => row.with_status(Status::BacklogUnread, details),
            CreateUnreadEntriesOutcome::UnexpectedStatus(_)
            | CreateUnreadEntriesOutcome::HttpError(_)
            | CreateUnreadEntriesOutcome::UnexpectedError(_) => {
                tracing::error!(row = row.index, feed_id = %feed_id, details = %details, "Marking backlog unread failed");
                row.failed(Step::MarkBacklogUnread, details)
            }
        }
    }

    async fn add_suffix(&self, row: Row) -> Row {
        let Some(subscription_id) = row.subscription_id else {
            tracing::error!(row = row.index, "Cannot add suffix without a subscription ID");
            return row.failed(Step::AddSuffix, "🚨 Missing subscription ID");
        };

        let outcome = rename_with_suffix(self.client, subscription_id).await;
        let details = outcome.to_string();

        match outcome {
            RenameOutcome::Renamed(subscription) | RenameOutcome::AlreadySuffixed(subscription) => {
                row.with_status(Status::SuffixAdded, subscription.title)
            }
            // The subscription is gone or not ours; subscribing again recovers it
            RenameOutcome::Get(GetSubscriptionOutcome::Forbidden(_))
            | RenameOutcome::Get(GetSubscriptionOutcome::NotFound(_))
            | RenameOutcome::Update(UpdateSubscriptionOutcome::Forbidden(_))
            | RenameOutcome::Update(UpdateSubscriptionOutcome::NotFound(_)) => {
                row.with_status(Status::NotFound, details)
            }
            RenameOutcome::Get(
                GetSubscriptionOutcome::Ok(_)
                | GetSubscriptionOutcome::UnexpectedStatus(_)
                | GetSubscriptionOutcome::HttpError(_)
                | GetSubscriptionOutcome::UnexpectedError(_),
            )
            | RenameOutcome::Update(
                UpdateSubscriptionOutcome::Ok(_)
                | UpdateSubscriptionOutcome::UnexpectedStatus(_)
                | UpdateSubscriptionOutcome::HttpError(_)
                | UpdateSubscriptionOutcome::UnexpectedError(_),
            ) => {
                tracing::error!(row = row.index, subscription_id = %subscription_id, details = %details, "Adding suffix failed");
                row.failed(Step::AddSuffix, details)
            }
        }
    }

    /// Writes the row's block; failures are logged, not propagated.
    async fn write_back(&self, row: &Row) -> bool {
        let range = self.layout.range(row.index);
        match self
            .sheet
            .write_range(&range, vec![self.layout.row_values(row)])
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(row = row.index, range = %range, error = %e, "Failed to write row back to sheet");
                false
            }
        }
    }
}
