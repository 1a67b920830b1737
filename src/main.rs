// coin - command line front end for a local skillcoin ledger

use anyhow::Context;
use clap::{Parser, Subcommand};
use skillcoin::ledger::{AggregateLedger, VersionedLedger};
use skillcoin::skills::{NewSkill, SkillBook, SkillId, SkillSource, SkillUpdate};
use skillcoin::lock::HolderLockManager;
use skillcoin::worker::StatsWorker;
use skillcoin::{CoinStore, Config, HolderId, TransferEngine, TransferRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coin")]
#[command(about = "Issue and transfer skill-backed personal coins")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "skillcoin.toml")]
    config: PathBuf,

    /// Data directory (overrides config file)
    #[arg(short, long, env = "SKILLCOIN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Versioned rows per page when planning a spend (overrides config file)
    #[arg(long)]
    page_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a holder and its coin ("Grey Heron" registers grey-heron)
    Register {
        #[arg(value_parser = HolderId::normalize)]
        holder: HolderId,
    },

    /// Manage a holder's skills
    #[command(subcommand)]
    Skill(SkillCommand),

    /// Pay `amount` of `coin` from payer to receiver (payer == coin issues)
    Pay {
        payer: HolderId,
        receiver: HolderId,
        coin: HolderId,
        amount: u64,
        /// Unbacked marker payment
        #[arg(long)]
        marker: bool,
    },

    /// Show a holder's balances
    Balance {
        holder: HolderId,
        /// Break one coin out by backing version
        #[arg(long)]
        coin: Option<HolderId>,
    },

    /// Show pay records involving a holder
    History { holder: HolderId },

    /// Show a holder's activity feed and mark it read
    News { holder: HolderId },
}

#[derive(Subcommand)]
enum SkillCommand {
    /// List a new skill
    Add {
        owner: HolderId,
        title: String,
        price: u64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "picture")]
        pictures: Vec<String>,
    },

    /// Replace a skill's price, description, tags and pictures
    Update {
        owner: HolderId,
        id: u64,
        price: u64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "picture")]
        pictures: Vec<String>,
    },

    /// Activate or withdraw a skill
    Switch {
        owner: HolderId,
        id: u64,
        #[arg(long)]
        off: bool,
    },

    /// List a holder's skills
    List { owner: HolderId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(page_size) = cli.page_size {
        config.engine.page_size = page_size;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    info!(data_dir = %config.storage.data_dir.display(), "opening ledger");
    let store = CoinStore::open(&config.storage.data_dir)?;
    let locks = HolderLockManager::new();
    let book = SkillBook::new(store.clone(), locks.clone())
        .with_max_skills(config.engine.max_skills_per_holder);

    let (events, worker) = StatsWorker::new(Arc::new(store.clone()), config.worker.clone())
        .spawn(config.engine.stats_queue_capacity);
    let engine = TransferEngine::new(
        store.clone(),
        locks,
        Arc::new(book.clone()) as Arc<dyn SkillSource>,
        config.engine.clone(),
    )
    .with_events(events);

    let result = run(cli.command, &store, &book, &engine).await;

    // Closing the last sender lets the worker drain and stop
    drop(engine);
    match worker.join().await {
        Ok(stats) => info!(issuances = stats.issuances_recorded, failures = stats.failures, "stats worker done"),
        Err(e) => error!(error = %e, "stats worker failed"),
    }
    store.flush()?;

    result
}

async fn run(command: Command, store: &CoinStore, book: &SkillBook, engine: &TransferEngine) -> anyhow::Result<()> {
    match command {
        Command::Register { holder } => {
            if store.register_holder(&holder)? {
                println!("registered {}", holder);
            } else {
                println!("{} is already registered", holder);
            }
        }

        Command::Skill(cmd) => run_skill(cmd, book)?,

        Command::Pay {
            payer,
            receiver,
            coin,
            amount,
            marker,
        } => {
            let request = TransferRequest::new(payer, receiver, coin, amount).with_marker(marker);
            match engine.transfer(request).await {
                Ok(receipt) => {
                    println!("{} {} settled ({})", receipt.kind(), receipt.total(), receipt.correlation());
                    for record in receipt.records() {
                        let version = record
                            .version()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "marker".to_string());
                        println!("  {} {} {} -> {}", record.amount(), version, record.payer(), record.receiver());
                    }
                }
                Err(e) if e.is_rejection() => {
                    println!("rejected [{}]: {}", e.code(), e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Balance { holder, coin } => {
            let aggregate = AggregateLedger::new(store.clone());
            for row in aggregate.holdings(&holder)? {
                let kind = if row.key().is_marker() { " (marker)" } else { "" };
                println!("{:>10} {}{}", row.amount(), row.key().coin(), kind);
            }
            if let Some(coin) = coin {
                let versioned = VersionedLedger::new(store.clone(), engine.config().page_size);
                for row in versioned.list_for_display(&holder, &coin)? {
                    println!("{:>10} {} {}", row.amount(), coin, row.version());
                }
            }
        }

        Command::History { holder } => {
            for record in store.records_for(&holder)? {
                let issue = if record.is_issue() { " issue" } else { "" };
                println!(
                    "{} {} {} {} -> {}{}",
                    record.correlation(),
                    record.amount(),
                    record.coin(),
                    record.payer(),
                    record.receiver(),
                    issue
                );
            }
        }

        Command::News { holder } => {
            if !store.has_unread(&holder)? {
                println!("no unread activity");
            }
            for entry in store.activity(&holder)? {
                println!("{}", entry.describe());
            }
            store.mark_read(&holder)?;
        }
    }
    Ok(())
}

fn run_skill(command: SkillCommand, book: &SkillBook) -> anyhow::Result<()> {
    match command {
        SkillCommand::Add {
            owner,
            title,
            price,
            description,
            tags,
            pictures,
        } => {
            let new = NewSkill::new(&title, price)
                .with_description(&description)
                .with_tags(tags)
                .with_pictures(pictures);
            let skill = book.add_skill(&owner, new)?;
            println!("added {} {:?} at {}", skill.id(), skill.title(), skill.price());
        }

        SkillCommand::Update {
            owner,
            id,
            price,
            description,
            tags,
            pictures,
        } => {
            let update = SkillUpdate {
                price,
                description,
                tags,
                pictures,
            };
            let skill = book.update_skill(&owner, SkillId::new(id), update)?;
            println!("updated {} to version {}", skill.id(), skill.version());
        }

        SkillCommand::Switch { owner, id, off } => {
            let skill = book.set_active(&owner, SkillId::new(id), !off)?;
            let state = if skill.is_active() { "active" } else { "inactive" };
            println!("{} is {}", skill.id(), state);
        }

        SkillCommand::List { owner } => {
            for skill in book.list_skills(&owner)? {
                let state = if skill.is_active() { "" } else { " (inactive)" };
                println!("{} {:>8} {}{}", skill.id(), skill.price(), skill.title(), state);
            }
        }
    }
    Ok(())
}
