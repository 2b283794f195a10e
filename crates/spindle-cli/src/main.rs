use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use spindle_core::app::{StatusCounts, TaskStatusView};
use spindle_core::impls::{InMemoryRecordStore, InMemorySearchIndex};
use spindle_core::ports::{RecordType, TaskStore};
use spindle_core::{Engine, EngineBuilder, EngineConfig, JobContext, Performable};

#[derive(Debug, Parser)]
#[command(name = "spindle", about = "Run demo jobs against the in-memory spindle engine")]
struct Cli {
    /// JSON engine config; unset fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Square numbers in parallel inside a foreground job.
    Batch {
        #[arg(long, default_value_t = 10_000)]
        items: usize,
        #[arg(long, default_value_t = 4)]
        threads: usize,
        /// Make every n-th item fail (0 = never).
        #[arg(long, default_value_t = 0)]
        fail_every: usize,
        #[arg(long)]
        progress: bool,
    },
    /// Rebuild an in-memory search index, then sweep orphans.
    Reindex {
        #[arg(long, default_value_t = 5_000)]
        records: usize,
        #[arg(long)]
        threads: Option<usize>,
        /// Stale documents seeded into the index before the sweep.
        #[arg(long, default_value_t = 3)]
        orphans: usize,
    },
    /// Run one greeting job on the calling thread.
    Foreground {
        name: String,
        #[arg(long)]
        fail: bool,
    },
    /// Enqueue greeting jobs and let a worker group run them.
    Background {
        #[arg(long, default_value_t = 5)]
        jobs: usize,
        #[arg(long, default_value_t = 2)]
        workers: usize,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct SquareArgs {
    items: usize,
    threads: usize,
    fail_every: usize,
    progress: bool,
}

struct SquareNumbers;

impl Performable for SquareNumbers {
    const TYPE: &'static str = "demo.square.v1";
    type Args = SquareArgs;

    fn task_name(&self, args: &SquareArgs) -> String {
        format!("Squaring {} numbers", args.items)
    }

    fn perform(&self, args: SquareArgs, ctx: &JobContext) -> anyhow::Result<()> {
        let numbers: Vec<usize> = (1..=args.items).collect();
        let fail_every = args.fail_every;
        let report = ctx.process_in_parallel(&numbers, args.threads, args.progress, |n: usize| {
            if fail_every > 0 && n % fail_every == 0 {
                bail!("refusing to square {n}");
            }
            std::hint::black_box(n.checked_mul(n).context("overflow")?);
            Ok(())
        })?;
        tracing::info!(?report, "batch report");
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GreetArgs {
    name: String,
    fail: bool,
}

struct Greet;

impl Performable for Greet {
    const TYPE: &'static str = "demo.greet.v1";
    type Args = GreetArgs;

    fn task_name(&self, args: &GreetArgs) -> String {
        format!("Greeting {}", args.name)
    }

    fn perform(&self, args: GreetArgs, ctx: &JobContext) -> anyhow::Result<()> {
        if args.fail {
            bail!("{} does not want to be greeted", args.name);
        }
        ctx.task().set_status_text(format!("Hello, {}!", args.name))?;
        Ok(())
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(EngineConfig::from_json_str(&raw)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn engine(config: EngineConfig, builder: EngineBuilder) -> anyhow::Result<Engine> {
    Ok(builder
        .config(config)
        .register(SquareNumbers)?
        .register(Greet)?
        .expect_jobs(&[SquareNumbers::TYPE, Greet::TYPE])
        .build()?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Batch {
            items,
            threads,
            fail_every,
            progress,
        } => {
            let engine = engine(config, EngineBuilder::new())?;
            let args = SquareArgs {
                items,
                threads,
                fail_every,
                progress,
            };
            let task = engine.runner().perform_in_foreground(&SquareNumbers, args)?;
            print_json(&TaskStatusView::from(&task))?;
        }
        Command::Reindex {
            records,
            threads,
            orphans,
        } => {
            let record_type = RecordType::new("Item");
            let store = Arc::new(InMemoryRecordStore::new());
            for i in 0..records {
                store.insert(&record_type, format!("item-{i:07}"));
            }
            let index = Arc::new(InMemorySearchIndex::new());
            for i in 0..orphans {
                index.seed(&record_type, format!("stale-{i}"));
            }

            let engine = engine(
                config,
                EngineBuilder::new()
                    .record_store(store)
                    .search_index(index.clone()),
            )?;
            let summary = engine.reindexer().reindex_all(&record_type, threads)?;
            let deleted = engine.reindexer().delete_orphaned_documents(&record_type)?;
            print_json(&serde_json::json!({
                "reindexed": summary,
                "orphans_deleted": deleted,
                "documents": index.document_count(&record_type),
            }))?;
        }
        Command::Foreground { name, fail } => {
            let engine = engine(config, EngineBuilder::new())?;
            match engine
                .runner()
                .perform_in_foreground(&Greet, GreetArgs { name, fail })
            {
                Ok(task) => print_json(&TaskStatusView::from(&task))?,
                Err(err) => {
                    let views: Vec<TaskStatusView> =
                        engine.store().list()?.iter().map(TaskStatusView::from).collect();
                    print_json(&views)?;
                    return Err(err.into());
                }
            }
        }
        Command::Background { jobs, workers } => {
            let engine = engine(config, EngineBuilder::new())?;
            for i in 0..jobs {
                engine.runner().enqueue::<Greet>(&GreetArgs {
                    name: format!("guest {i}"),
                    fail: i % 4 == 3,
                })?;
            }

            let group = engine.spawn_workers(workers);
            loop {
                let counts = StatusCounts::from_store(engine.store().as_ref())?;
                if counts.succeeded + counts.failed == jobs {
                    break;
                }
                thread::sleep(Duration::from_millis(20));
            }
            group.shutdown_and_join();

            print_json(&StatusCounts::from_store(engine.store().as_ref())?)?;
        }
    }
    Ok(())
}
