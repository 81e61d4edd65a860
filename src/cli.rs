use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use console::{style, StyledObject};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::{AggregatorAccount, AggregatorClient, HttpAggregatorClient};
use crate::args::{Args, Command};
use crate::config::Configuration;
use crate::download::DownloadRoutine;
use crate::jobs::{JobStatus, JobStatusStore};
use crate::ledger::{HttpLedgerClient, LedgerAccount, LedgerClient};
use crate::reconcile::match_accounts;
use crate::store::{ContentStore, DirectoryStore};
use crate::sync::SyncRoutine;
use crate::terminal::{self, BulletPointPrinter};

pub async fn main(args: Args) -> Result<()> {
    let cli = Cli::new(&args).await?;
    match args.command {
        Command::Banks => cli.main_banks().await?,
        Command::Accounts { requisition } => cli.main_accounts(requisition).await?,
        Command::Download { identifier } => {
            cli.main_download(identifier).await?;
        }
        Command::Sync { download } => cli.main_sync(&download).await?,
        Command::Run => cli.main_run().await?,
        Command::Status { job } => cli.main_status(&job).await?,
    }
    Ok(())
}

pub struct Cli {
    configuration: Configuration,
    aggregator: Arc<dyn AggregatorClient>,
    ledger: Arc<dyn LedgerClient>,
    jobs: JobStatusStore,
    downloads: Arc<dyn ContentStore>,
}

impl Cli {
    async fn new(args: &Args) -> Result<Self> {
        let bytes = tokio::fs::read(&args.config).await.with_context(|| {
            format!("Failed to read configuration file {}", args.config.display())
        })?;
        let mut configuration =
            Configuration::from_json(&bytes).context("Failed to parse configuration file")?;
        configuration.update_date_range(Utc::now().date_naive());

        let aggregator_url = env_var("BANKBRIDGE_AGGREGATOR_URL")?;
        let secret_id = env_var("BANKBRIDGE_AGGREGATOR_ID")?;
        let secret_key = env_var("BANKBRIDGE_AGGREGATOR_KEY")?;
        let ledger_url = env_var("BANKBRIDGE_LEDGER_URL")?;
        let ledger_token = env_var("BANKBRIDGE_LEDGER_TOKEN")?;

        let jobs = JobStatusStore::new(Arc::new(
            DirectoryStore::open(args.data_dir.join("jobs")).await?,
        ));
        let downloads: Arc<dyn ContentStore> =
            Arc::new(DirectoryStore::open(args.data_dir.join("downloads")).await?);

        Ok(Self {
            configuration,
            aggregator: Arc::new(HttpAggregatorClient::new(
                &aggregator_url,
                secret_id,
                secret_key,
            )),
            ledger: Arc::new(HttpLedgerClient::new(&ledger_url, ledger_token)),
            jobs,
            downloads,
        })
    }

    async fn main_banks(&self) -> Result<()> {
        let banks = self
            .aggregator
            .list_banks(&self.configuration.country)
            .await?;
        println!("{}", style_header("Banks:"));
        if banks.is_empty() {
            println!("(none)");
            return Ok(());
        }
        let printer = BulletPointPrinter::new();
        for bank in banks {
            printer.print_item(format!("{} {}", style_identifier(&bank.id), bank.name));
        }
        Ok(())
    }

    async fn main_accounts(&self, requisition: Option<String>) -> Result<()> {
        let reference = self.requisition_reference(requisition)?;
        let aggregator_accounts = self.aggregator.list_accounts(&reference).await?;
        let ledger_accounts = self.ledger.list_accounts(Some("asset")).await?;
        let matches = match_accounts(&aggregator_accounts, &ledger_accounts);

        println!("{}", style_header("Accounts:"));
        let printer = BulletPointPrinter::new();
        for account_match in &matches {
            printer.print_item(style_account(&account_match.aggregator));
            let printer = printer.indent();
            if account_match.candidates.is_empty() {
                printer.print_item(style("(no candidates)").italic());
            }
            for candidate in &account_match.candidates {
                printer.print_item(style_candidate(candidate));
            }
        }

        let categories = self.ledger.list_categories().await?;
        println!();
        println!("{}", style_header("Categories:"));
        if categories.is_empty() {
            println!("(none)");
            return Ok(());
        }
        let printer = BulletPointPrinter::new();
        for category in categories {
            printer.print_item(format!(
                "{} {}",
                style_identifier(&category.id.to_string()),
                category.name
            ));
        }
        Ok(())
    }

    fn requisition_reference(&self, requisition: Option<String>) -> Result<String> {
        if let Some(reference) = requisition {
            return Ok(reference);
        }
        if let Some(reference) = self.configuration.requisitions.values().next() {
            return Ok(reference.clone());
        }
        terminal::prompt("Bank-connection (requisition) reference")
    }

    async fn main_download(&self, identifier: Option<String>) -> Result<String> {
        let routine = DownloadRoutine::new(
            self.aggregator.clone(),
            self.jobs.clone(),
            self.downloads.clone(),
        );
        let spinner = spinner("Downloading transactions...");
        let result = routine.run(&self.configuration, identifier).await;
        spinner.finish_and_clear();
        let identifier = result?;
        println!(
            "Download stored under identifier {}",
            style_identifier(&identifier)
        );
        Ok(identifier)
    }

    async fn main_sync(&self, download: &str) -> Result<()> {
        if !self.configuration.skip_form
            && !terminal::confirm("Send the downloaded transactions to the ledger?")?
        {
            println!("Not sending anything.");
            return Ok(());
        }
        let routine = SyncRoutine::new(
            self.ledger.clone(),
            self.jobs.clone(),
            self.downloads.clone(),
        );
        let spinner = spinner("Sending transactions to the ledger...");
        let result = routine.run(&self.configuration, download, None).await;
        spinner.finish_and_clear();
        let report = result?;

        println!(
            "Sent {} transaction(s), {} failed (job {})",
            report.sent(),
            report.failed(),
            style_identifier(&report.sync_identifier)
        );
        if let Some(status) = self.jobs.find(&report.sync_identifier).await? {
            print_job_logs(&status);
        }
        if report.failed() > 0 {
            bail!(
                "{} of {} transactions could not be imported",
                report.failed(),
                report.outcomes.len()
            );
        }
        Ok(())
    }

    async fn main_run(&self) -> Result<()> {
        let identifier = self.main_download(None).await?;
        self.main_sync(&identifier).await
    }

    async fn main_status(&self, job: &str) -> Result<()> {
        match self.jobs.find(job).await? {
            None => println!("No job found under identifier {job}"),
            Some(status) => {
                println!("{} {}", style_header("Status:"), status.status);
                print_job_logs(&status);
            }
        }
        Ok(())
    }
}

fn print_job_logs(status: &JobStatus) {
    let printer = BulletPointPrinter::new();
    for (title, log, styler) in [
        ("Messages:", &status.messages, style_message as StyleFn),
        ("Warnings:", &status.warnings, style_warning as StyleFn),
        ("Errors:", &status.errors, style_error as StyleFn),
    ] {
        if log.is_empty() {
            continue;
        }
        println!("{}", style_header(title));
        for (index, lines) in log {
            printer.print_item(format!("line {index}"));
            let printer = printer.indent();
            for line in lines {
                printer.print_item(styler(line));
            }
        }
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("Environment variable {name} must be set"))
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

type StyleFn = fn(&str) -> StyledObject<&str>;

fn style_header(header: &str) -> StyledObject<&str> {
    style(header).bold().underlined()
}

fn style_identifier(identifier: &str) -> StyledObject<&str> {
    style(identifier).cyan().bold()
}

fn style_account(account: &AggregatorAccount) -> String {
    let mut label = format!("{} ({})", account.name, account.id);
    if !account.iban.is_empty() {
        label = format!("{label} {}", account.iban);
    }
    style(label).magenta().to_string()
}

fn style_candidate(account: &LedgerAccount) -> String {
    let mut label = format!("#{} {}", account.id, account.name);
    if !account.iban.is_empty() {
        label = format!("{label} ({})", account.iban);
    }
    style(label).blue().to_string()
}

fn style_message(message: &str) -> StyledObject<&str> {
    style(message).green()
}

fn style_warning(warning: &str) -> StyledObject<&str> {
    style(warning).yellow()
}

fn style_error(error: &str) -> StyledObject<&str> {
    style(error).red()
}
