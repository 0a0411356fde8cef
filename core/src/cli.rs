use crate::config::RuntimeConfig;
use crate::demos;
use crate::runner::{EventProcessingMode, RunHooks, Runner};
use crate::runtime::{Completion, Runtime, Strategy, Thunk};
use crate::scheduler::TokioScheduler;
use crate::suspend::Suspender;
use crate::values::ObjRef;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value as JsonValue};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use tracing::info;

#[derive(Parser)]
#[command(name = "rewind")]
#[command(about = "Rewind - run instrumented programs with first-class continuations", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a bundled demo program and print what happened as JSON
    Run {
        /// Demo name (see `rewind demos`)
        demo: String,

        /// Capture strategy: eager or lazy (overrides config)
        #[arg(long)]
        strategy: Option<Strategy>,

        /// Pause at this line (repeatable)
        #[arg(long = "break")]
        breakpoints: Vec<u32>,

        /// After a breakpoint, step line by line instead of resuming
        #[arg(long)]
        step: bool,

        /// Yield interval in milliseconds (overrides config)
        #[arg(long)]
        yield_interval_ms: Option<u64>,
    },

    /// List bundled demos
    Demos,
}

/* ===================== Demo Table ===================== */

pub struct DemoInfo {
    pub name: &'static str,
    pub about: &'static str,
}

pub const DEMOS: &[DemoInfo] = &[
    DemoInfo {
        name: "count",
        about: "counts to 10, reaching a suspension point after every value",
    },
    DemoInfo {
        name: "lines",
        about: "eight numbered lines, each followed by a suspension point",
    },
    DemoInfo {
        name: "guarded",
        about: "suspends inside a call guarded by a handler, then throws",
    },
    DemoInfo {
        name: "point",
        about: "constructs an object whose constructor suspends halfway",
    },
    DemoInfo {
        name: "capture",
        about: "captures five calls deep and resumes from the capture handler",
    },
];

fn demo_body(name: &str, s: &Suspender, trace: &demos::Trace) -> Result<Thunk> {
    let (s, trace) = (s.clone(), trace.clone());
    let body: Thunk = match name {
        "count" => Box::new(move |rt: &mut dyn Runtime| demos::count_to(rt, &s, &trace, 10)),
        "lines" => Box::new(move |rt: &mut dyn Runtime| demos::lines(rt, &s, &trace, 8)),
        "guarded" => Box::new(move |rt: &mut dyn Runtime| demos::guarded(rt, &s, &trace)),
        "point" => {
            let seen: Rc<RefCell<Vec<ObjRef>>> = Rc::default();
            let ctor = demos::point_constructor(&s, &seen);
            Box::new(move |rt: &mut dyn Runtime| demos::make_point(rt, &ctor, 3.0, 4.0))
        }
        "capture" => {
            Box::new(move |rt: &mut dyn Runtime| demos::capture_and_resume(rt, &trace, 5, 100.0))
        }
        other => bail!("Unknown demo '{}'. Run `rewind demos` to list them.", other),
    };
    Ok(body)
}

/* ===================== Entry Points ===================== */

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Demos => {
            for demo in DEMOS {
                println!("  {:<10} {}", demo.name, demo.about);
            }
        }

        Commands::Run {
            demo,
            strategy,
            breakpoints,
            step,
            yield_interval_ms,
        } => {
            let mut config = match &cli.config {
                Some(path) => RuntimeConfig::load_from(Some(Path::new(path)))?,
                None => RuntimeConfig::load()?,
            };
            if let Some(strategy) = strategy {
                config.strategy = strategy;
            }
            if let Some(ms) = yield_interval_ms {
                config.yield_interval_ms = ms;
            }
            config.validate()?;

            let local = tokio::task::LocalSet::new();
            let report = local
                .run_until(run_demo(&demo, &config, breakpoints, step))
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Drive one demo to completion on the current `LocalSet`.
async fn run_demo(
    name: &str,
    config: &RuntimeConfig,
    breakpoints: Vec<u32>,
    step: bool,
) -> Result<JsonValue> {
    let runner = Runner::new(config, Rc::new(TokioScheduler));
    runner.set_breakpoints(breakpoints);

    let trace = demos::Trace::default();
    let body = demo_body(name, runner.suspender(), &trace)?;

    let events: Rc<RefCell<Vec<JsonValue>>> = Rc::default();
    let completion: Rc<RefCell<Option<Completion>>> = Rc::default();

    let hooks = {
        let (on_yield, on_breakpoint) = (events.clone(), events.clone());
        RunHooks {
            on_yield: Some(Box::new(move || on_yield.borrow_mut().push(json!({ "event": "yield" })))),
            on_breakpoint: Some(Box::new(move |line: u32| {
                on_breakpoint
                    .borrow_mut()
                    .push(json!({ "event": "breakpoint", "line": line }))
            })),
        }
    };

    info!(demo = name, strategy = config.strategy.name(), "running demo");
    let slot = completion.clone();
    runner.run(
        body,
        move |c: Completion| *slot.borrow_mut() = Some(c),
        hooks,
    )?;

    while completion.borrow().is_none() {
        match runner.mode() {
            EventProcessingMode::Paused if step => {
                let steps = events.clone();
                runner.step(move |line: u32| {
                    steps.borrow_mut().push(json!({ "event": "step", "line": line }))
                })?;
            }
            EventProcessingMode::Paused => runner.resume()?,
            _ if !runner.suspender().has_captured() => {
                bail!("Demo '{}' stopped without completing", name)
            }
            _ => tokio::task::yield_now().await,
        }
    }

    let result = completion
        .borrow()
        .as_ref()
        .map(Completion::to_json)
        .context("Demo completion missing")?;

    let events = events.borrow().clone();
    Ok(json!({
        "demo": name,
        "strategy": config.strategy.name(),
        "events": events,
        "trace": trace.entries(),
        "result": result,
    }))
}
