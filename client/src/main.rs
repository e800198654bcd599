use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use shared::{
    CategoryInput, DisconnectOptions, LinkMetadata, LoginCredentials, NotificationKind, RegisterData, Theme,
    TransactionFilters, TransactionKind,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use finance_tracker_client::config::default_data_dir;
use finance_tracker_client::domain::dashboard::category_budget_progress;
use finance_tracker_client::domain::formatting::{
    capitalize_words, format_currency, format_date_time, format_number, format_percentage, format_relative_date,
    truncate_text,
};
use finance_tracker_client::domain::{LinkOutcome, LinkWidget, WidgetEvent};
use finance_tracker_client::FinanceClient;

const DESCRIPTION_WIDTH: usize = 40;

#[derive(Parser)]
#[command(name = "finance-tracker", version, about = "Personal finance tracker client")]
struct Cli {
    /// Directory holding config.yaml and the saved session
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Monthly overview of balances and spending
    Dashboard {
        /// Month to summarize as YYYY-MM (defaults to the current month)
        #[arg(long, value_parser = parse_month)]
        month: Option<NaiveDate>,
    },
    /// List linked accounts
    Accounts,
    /// List transactions
    Transactions {
        #[arg(long)]
        account: Option<i64>,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        #[arg(long)]
        pending: Option<bool>,
        /// First date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Assign a category to a transaction
    Categorize { transaction: i64, category: i64 },
    /// List categories with their budgets
    Categories {
        /// Month used for budget progress as YYYY-MM
        #[arg(long, value_parser = parse_month)]
        month: Option<NaiveDate>,
    },
    /// Create a category
    AddCategory {
        name: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        budget: Option<f64>,
        #[arg(long)]
        parent: Option<i64>,
    },
    /// Delete a category
    DeleteCategory { id: i64 },
    /// Re-synchronize linked accounts with the bank
    Sync {
        /// Only this account
        #[arg(long)]
        account: Option<i64>,
        /// Ask the backend to refresh stored transactions instead of syncing with the bank
        #[arg(long, requires = "account")]
        refresh: bool,
        /// Re-synchronize transactions only
        #[arg(long, conflicts_with = "refresh")]
        transactions: bool,
    },
    /// Link a bank account
    Link,
    /// Disconnect a linked account
    Disconnect {
        id: i64,
        /// Delete the historical transactions of the account
        #[arg(long)]
        remove_transactions: bool,
        /// Remove the account entirely instead of deactivating it
        #[arg(long)]
        remove_account: bool,
        /// Drop category assignments of removed transactions
        #[arg(long)]
        discard_categories: bool,
    },
    /// Show whether a bank connection exists
    LinkStatus,
    /// Show or change the color theme
    Theme {
        #[arg(value_enum)]
        action: Option<ThemeArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Expenses,
    Income,
}

impl From<KindArg> for TransactionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Expenses => TransactionKind::Expenses,
            KindArg::Income => TransactionKind::Income,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
    Toggle,
}

fn parse_month(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM, got {}", value))
}

/// Stands in for the bank-link widget: shows the link token and reads back
/// the public token the user obtained with it.
struct TerminalWidget;

#[async_trait]
impl LinkWidget for TerminalWidget {
    async fn open(&self, link_token: &str) -> WidgetEvent {
        println!("Link token: {}", link_token);
        println!("Complete the bank connection, then paste the public token (empty line cancels):");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = stdin.read_line(&mut line).await {
            debug!("Failed to read public token: {}", e);
        }

        match line.trim() {
            "" => WidgetEvent::Exit {
                error: None,
                metadata: LinkMetadata::default(),
            },
            token => WidgetEvent::Success {
                public_token: token.to_string(),
                metadata: LinkMetadata::default(),
            },
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    info!("Starting finance tracker client in {}", data_dir.display());
    let client = FinanceClient::open(&data_dir)?;

    let result = match cli.command {
        Commands::Login { email, password } => login(&client, email, password).await,
        Commands::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            let data = RegisterData {
                email,
                password_confirmation: password.clone(),
                password,
                first_name,
                last_name,
            };
            let user = client.session().register(&data).await?;
            println!("Welcome, {}!", user.full_name());
            Ok(())
        }
        Commands::Logout => {
            client.session().logout().await;
            println!("Signed out.");
            Ok(())
        }
        Commands::Whoami => whoami(&client).await,
        Commands::Dashboard { month } => {
            require_session(&client).await?;
            dashboard(&client, month.unwrap_or_else(today)).await
        }
        Commands::Accounts => {
            require_session(&client).await?;
            accounts(&client).await
        }
        Commands::Transactions {
            account,
            category,
            kind,
            pending,
            from,
            to,
            search,
            page,
            per_page,
        } => {
            require_session(&client).await?;
            let filters = TransactionFilters {
                page,
                per_page,
                account_id: account,
                category_id: category,
                kind: kind.map(Into::into),
                pending,
                start_date: from,
                end_date: to,
                search,
                sort: None,
            };
            transactions(&client, &filters).await
        }
        Commands::Categorize { transaction, category } => {
            require_session(&client).await?;
            client.transactions().categorize(transaction, category, None).await?;
            Ok(())
        }
        Commands::Categories { month } => {
            require_session(&client).await?;
            categories(&client, month.unwrap_or_else(today)).await
        }
        Commands::AddCategory {
            name,
            color,
            budget,
            parent,
        } => {
            require_session(&client).await?;
            let input = CategoryInput {
                name: Some(name),
                color,
                description: None,
                budget_limit: budget,
                parent_category_id: parent,
            };
            client.categories().create(&input).await?;
            Ok(())
        }
        Commands::DeleteCategory { id } => {
            require_session(&client).await?;
            client.categories().delete(id).await?;
            Ok(())
        }
        Commands::Sync {
            account,
            refresh,
            transactions,
        } => {
            require_session(&client).await?;
            let response = match (account, refresh, transactions) {
                (_, _, true) => client.transactions().sync_transactions(account).await,
                (Some(id), true, _) => client.accounts().refresh_account(id).await,
                (Some(id), false, _) => client.accounts().sync_account(id).await,
                (None, _, _) => client.accounts().sync_all().await,
            }?;
            debug!("Sync finished: {}", response.message);
            Ok(())
        }
        Commands::Link => {
            require_session(&client).await?;
            link(&client).await
        }
        Commands::Disconnect {
            id,
            remove_transactions,
            remove_account,
            discard_categories,
        } => {
            require_session(&client).await?;
            disconnect(
                &client,
                id,
                DisconnectOptions {
                    remove_transactions,
                    remove_account,
                    keep_categories: !discard_categories,
                },
            )
            .await
        }
        Commands::LinkStatus => {
            require_session(&client).await?;
            let status = client.accounts().link_status().await?;
            if status.connected {
                println!("Connected: {} account(s)", status.accounts_count);
            } else {
                println!("No bank connection");
            }
            if let Some(last_sync) = status.last_sync {
                println!("Last sync: {}", format_date_time(&last_sync));
            }
            Ok(())
        }
        Commands::Theme { action } => theme(&client, action),
    };

    print_notifications(&client);
    result
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn require_session(client: &FinanceClient) -> Result<()> {
    if client.session().initialize_auth().await {
        Ok(())
    } else {
        bail!("Not signed in. Run `finance-tracker login` first.")
    }
}

async fn login(client: &FinanceClient, email: String, password: String) -> Result<()> {
    let user = client
        .session()
        .login(&LoginCredentials { email, password })
        .await
        .context("Login failed")?;
    println!("Signed in as {} <{}>", user.full_name(), user.email);
    Ok(())
}

async fn whoami(client: &FinanceClient) -> Result<()> {
    if !client.session().initialize_auth().await {
        println!("Not signed in");
        return Ok(());
    }
    let user = client
        .session()
        .user()
        .ok_or_else(|| anyhow!("Session has no user"))?;
    println!("{} <{}>", user.full_name(), user.email);
    if user.admin {
        println!("Administrator");
    }
    Ok(())
}

async fn dashboard(client: &FinanceClient, month: NaiveDate) -> Result<()> {
    let summary = client.dashboard(month).await?;

    println!("Dashboard for {}", summary.month.format("%B %Y"));
    println!("  Accounts:            {}", format_number(Some(summary.account_count as f64)));
    println!("  Total balance:       {}", format_currency(Some(summary.total_balance), "USD"));
    println!("  Available:           {}", format_currency(Some(summary.total_available), "USD"));
    println!("  Debt:                {}", format_currency(Some(summary.total_debt), "USD"));
    println!("  Monthly spend:       {}", format_currency(Some(summary.monthly_spend), "USD"));
    println!("  Monthly income:      {}", format_currency(Some(summary.monthly_income), "USD"));
    println!("  Savings rate:        {}", format_percentage(Some(summary.savings_rate), 1));
    println!("  Average daily spend: {}", format_currency(Some(summary.average_daily_spend), "USD"));
    println!("  Top category:        {}", summary.top_category_label());

    if !summary.category_breakdown.is_empty() {
        println!();
        println!("Spending by category");
        for spend in &summary.category_breakdown {
            println!(
                "  {:<24} {:>12} {:>7} ({} transactions)",
                truncate_text(&spend.name, 24),
                format_currency(Some(spend.amount), "USD"),
                format_percentage(Some(spend.percentage), 1),
                spend.count
            );
        }
    }

    let tx = &summary.transaction_summary;
    if tx.pending_count > 0 || tx.uncategorized_count > 0 {
        println!();
        println!("{} pending, {} uncategorized", tx.pending_count, tx.uncategorized_count);
    }
    Ok(())
}

async fn accounts(client: &FinanceClient) -> Result<()> {
    let response = client.accounts().accounts().await?;
    if response.accounts.is_empty() {
        println!("No accounts linked. Run `finance-tracker link` to connect a bank.");
        return Ok(());
    }

    for account in &response.accounts {
        println!(
            "{:>5}  {:<32} {:<10} {:>14} {}",
            account.id,
            truncate_text(&account.display_name, 32),
            account.account_type,
            format_currency(Some(account.balance_current), &account.currency),
            account.institution_name
        );
    }
    println!(
        "Total: {} ({} available)",
        format_currency(Some(response.summary.total_balance), "USD"),
        format_currency(Some(response.summary.total_available), "USD")
    );
    Ok(())
}

async fn transactions(client: &FinanceClient, filters: &TransactionFilters) -> Result<()> {
    let response = client.transactions().transactions(filters).await?;
    let today = today();

    for tx in &response.transactions {
        let category = tx
            .primary_category
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("Uncategorized");
        println!(
            "{:>6}  {:<12} {:<width$} {:>12}  {}{}",
            tx.id,
            format_relative_date(tx.date, today),
            truncate_text(tx.display_name(), DESCRIPTION_WIDTH),
            format_currency(Some(tx.amount), &tx.currency),
            category,
            if tx.pending { " (pending)" } else { "" },
            width = DESCRIPTION_WIDTH
        );
    }

    let page = &response.pagination;
    println!(
        "Page {} of {} ({} transactions)",
        page.current_page,
        page.total_pages.max(1),
        format_number(Some(page.total_count as f64))
    );
    Ok(())
}

async fn categories(client: &FinanceClient, month: NaiveDate) -> Result<()> {
    let response = client.categories().categories().await?;
    let transactions = client.month_transactions(month).await?;

    for category in &response.categories {
        print_category(category, &transactions, month, 0);
    }
    Ok(())
}

fn print_category(
    category: &shared::Category,
    transactions: &[shared::Transaction],
    month: NaiveDate,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    let name = capitalize_words(&category.name);
    match category.budget_limit {
        Some(limit) => {
            let budget = category_budget_progress(category, transactions, month);
            println!(
                "{:>5}  {}{:<28} {:>12} of {:<12} {:>7} {}",
                category.id,
                indent,
                name,
                format_currency(Some(budget.spent), "USD"),
                format_currency(Some(limit), "USD"),
                format_percentage(budget.progress.percentage, 0),
                budget.progress.status.as_str()
            );
        }
        None => println!("{:>5}  {}{}", category.id, indent, name),
    }

    for child in &category.child_categories {
        print_category(child, transactions, month, depth + 1);
    }
}

async fn link(client: &FinanceClient) -> Result<()> {
    match client.link().run(&TerminalWidget).await {
        LinkOutcome::Linked { accounts } => {
            for account in accounts {
                println!("Linked {} ({})", account.display_name, account.account_type);
            }
            Ok(())
        }
        LinkOutcome::Cancelled => {
            println!("Bank connection cancelled.");
            Ok(())
        }
        LinkOutcome::Failed { error } => Err(error.into()),
        LinkOutcome::NotReady => bail!("A bank connection is already in progress"),
    }
}

async fn disconnect(client: &FinanceClient, account_id: i64, options: DisconnectOptions) -> Result<()> {
    let account = client.accounts().account(account_id).await?;
    let pending = client.link().request_disconnect(account);
    println!("Disconnecting {}...", pending.account().display_name);
    client.link().confirm_disconnect(pending, options).await?;
    Ok(())
}

fn theme(client: &FinanceClient, action: Option<ThemeArg>) -> Result<()> {
    let ui = client.ui();
    let theme = match action {
        None => ui.theme(),
        Some(ThemeArg::Toggle) => ui.toggle_theme()?,
        Some(ThemeArg::Light) => {
            ui.set_theme(Theme::Light)?;
            Theme::Light
        }
        Some(ThemeArg::Dark) => {
            ui.set_theme(Theme::Dark)?;
            Theme::Dark
        }
    };
    println!("Theme: {}", theme);
    Ok(())
}

fn print_notifications(client: &FinanceClient) {
    for notification in client.ui().notifications().list() {
        let label = match notification.kind {
            NotificationKind::Success => "ok",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        };
        println!("[{}] {}: {}", label, notification.title, notification.message);
    }
}
