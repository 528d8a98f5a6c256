use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use nova_callgraph::{
    CallGraph, CallGraphStats, CallingContext, CodeUnitSource, Direction, LinkageKind, MethodRef,
    Resolution, Workspace,
};
use nova_classpath::{load_classpath, ClasspathEntry};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "nova", version, about = "Nova CLI (JVM call graph and symbol resolution)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a call graph over class directories and jars, then query it
    Callgraph(CallgraphArgs),
}

#[derive(Args)]
struct CallgraphArgs {
    #[command(subcommand)]
    command: CallgraphCommand,
    /// Class directory, jar or jmod making up the primary resource (repeatable)
    #[arg(long, global = true)]
    classpath: Vec<PathBuf>,
    /// Class directory, jar or jmod added as a library (repeatable)
    #[arg(long, global = true)]
    library: Vec<PathBuf>,
    /// Directory searched for `nova.toml` (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    config_root: PathBuf,
    /// Emit JSON suitable for CI
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args)]
struct MethodArgs {
    /// Internal name of the declaring class, e.g. `com/example/Main`
    owner: String,
    name: String,
    /// Method descriptor, e.g. `([Ljava/lang/String;)V`
    descriptor: String,
}

impl MethodArgs {
    fn method_ref(&self) -> MethodRef {
        MethodRef::new(&self.owner, &self.name, &self.descriptor)
    }
}

#[derive(Subcommand)]
enum CallgraphCommand {
    /// Methods calling the given method
    Callers(MethodArgs),
    /// Methods called by the given method
    Callees(MethodArgs),
    /// Call tree rooted at the given method
    Tree {
        #[command(flatten)]
        method: MethodArgs,
        /// Expand callers instead of callees
        #[arg(long)]
        callers: bool,
        #[arg(long, default_value_t = 3)]
        depth: usize,
    },
    /// Calls that could not be linked, optionally for a single owner
    Unresolved { owner: Option<String> },
    /// Resolve a symbolic member reference
    Resolve {
        #[arg(value_enum)]
        kind: ResolveKind,
        owner: String,
        name: String,
        descriptor: String,
    },
    /// Graph size summary
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ResolveKind {
    Direct,
    Static,
    Virtual,
    Interface,
    StaticField,
    VirtualField,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Callgraph(args) => run_callgraph(args),
    }
}

struct Session {
    workspace: Arc<Workspace>,
    graph: CallGraph,
}

fn open_session(args: &CallgraphArgs) -> Result<Session> {
    let (config, config_path) = nova_config::load_for_workspace(&args.config_root)
        .with_context(|| format!("failed to load config from {}", args.config_root.display()))?;
    nova_config::init_tracing(&config.logging);
    if let Some(path) = &config_path {
        tracing::debug!(target: "nova.config", path = %path.display(), "loaded config");
        let (_, diagnostics) = nova_config::NovaConfig::load_from_path_with_diagnostics(path)?;
        for key in &diagnostics.unknown_keys {
            tracing::warn!(target: "nova.config", key = %key, "unknown config key");
        }
        for warning in &diagnostics.warnings {
            tracing::warn!(target: "nova.config", ?warning, "config warning");
        }
        if !diagnostics.is_ok() {
            bail!("invalid config {}: {:?}", path.display(), diagnostics.errors);
        }
    }
    if !config.call_graph.active {
        bail!(
            "call graph is disabled by configuration ({})",
            config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "defaults".to_string())
        );
    }

    let entries: Vec<_> = args
        .classpath
        .iter()
        .map(ClasspathEntry::from_path)
        .collect();
    let primary = load_classpath("classpath", &entries).context("failed to load classpath")?;
    let workspace = Arc::new(Workspace::new(primary));
    for path in &args.library {
        let library = ClasspathEntry::from_path(path)
            .load_resource()
            .with_context(|| format!("failed to load library {}", path.display()))?;
        workspace.add_library(library);
    }

    let source: Arc<dyn CodeUnitSource> = workspace.clone();
    let graph = CallGraph::new(source, &config.call_graph);
    graph.initialize().context("failed to build call graph")?;
    Ok(Session { workspace, graph })
}

fn run_callgraph(args: CallgraphArgs) -> Result<i32> {
    let session = open_session(&args)?;
    let graph = &session.graph;

    match &args.command {
        CallgraphCommand::Callers(method) | CallgraphCommand::Callees(method) => {
            let target = method.method_ref();
            if graph.vertex(&target)?.is_none() {
                eprintln!("no such method: {target}");
                return Ok(1);
            }
            let methods = if matches!(args.command, CallgraphCommand::Callers(_)) {
                graph.callers_of(&target)?
            } else {
                graph.calls_of(&target)?
            };
            if args.json {
                print_json(&methods)?;
            } else {
                for method in &methods {
                    println!("{method}");
                }
            }
            Ok(0)
        }
        CallgraphCommand::Tree {
            method,
            callers,
            depth,
        } => {
            let direction = if *callers {
                Direction::Callers
            } else {
                Direction::Callees
            };
            let target = method.method_ref();
            let Some(tree) = graph.call_tree(&target, direction, *depth)? else {
                eprintln!("no such method: {target}");
                return Ok(1);
            };
            if args.json {
                print_json(&tree)?;
            } else {
                print!("{}", tree.render());
            }
            Ok(0)
        }
        CallgraphCommand::Unresolved { owner } => {
            let owners = match owner {
                Some(owner) => vec![owner.clone()],
                None => graph.unresolved_owners(),
            };
            let report: Vec<_> = owners
                .into_iter()
                .map(|owner| UnresolvedOwner {
                    calls: graph.unresolved_calls_for_owner(&owner).into_iter().collect(),
                    references: graph
                        .unresolved_references_for_owner(&owner)
                        .into_iter()
                        .collect(),
                    owner,
                })
                .collect();
            if args.json {
                print_json(&report)?;
            } else {
                for entry in &report {
                    println!("{}:", entry.owner);
                    for call in &entry.calls {
                        println!("  {call}");
                    }
                    for reference in &entry.references {
                        println!(
                            "    from {} ({})",
                            reference.caller,
                            reference.site.kind.as_str()
                        );
                    }
                }
            }
            Ok(0)
        }
        CallgraphCommand::Resolve {
            kind,
            owner,
            name,
            descriptor,
        } => {
            let report = match session.workspace.class(owner) {
                None => ResolveReport::failed("owner not found"),
                Some(unit) => {
                    let resolution = match kind {
                        ResolveKind::StaticField => {
                            graph.resolve_field(&unit, name, descriptor, true)?
                        }
                        ResolveKind::VirtualField => {
                            graph.resolve_field(&unit, name, descriptor, false)?
                        }
                        ResolveKind::Direct
                        | ResolveKind::Static
                        | ResolveKind::Virtual
                        | ResolveKind::Interface => {
                            let linkage = match kind {
                                ResolveKind::Direct => LinkageKind::Direct,
                                ResolveKind::Static => LinkageKind::Static,
                                ResolveKind::Virtual => LinkageKind::Virtual,
                                _ => LinkageKind::Interface,
                            };
                            graph.resolve(linkage, &unit, name, descriptor, unit.is_interface())?
                        }
                    };
                    ResolveReport::from_resolution(&resolution)
                }
            };
            let exit = if report.resolved { 0 } else { 1 };
            if args.json {
                print_json(&report)?;
            } else if report.resolved {
                println!(
                    "{}.{}{} (access 0x{:04x})",
                    report.declaring_class.as_deref().unwrap_or_default(),
                    name,
                    descriptor,
                    report.access.unwrap_or_default()
                );
            } else {
                println!("unresolved: {}", report.failure.as_deref().unwrap_or_default());
            }
            Ok(exit)
        }
        CallgraphCommand::Stats => {
            let stats = graph.stats();
            if args.json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
            Ok(0)
        }
    }
}

#[derive(Serialize)]
struct UnresolvedOwner {
    owner: String,
    calls: Vec<MethodRef>,
    references: Vec<CallingContext>,
}

#[derive(Serialize)]
struct ResolveReport {
    resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    declaring_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl ResolveReport {
    fn failed(reason: &str) -> Self {
        Self {
            resolved: false,
            declaring_class: None,
            access: None,
            failure: Some(reason.to_string()),
        }
    }

    fn from_resolution(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Resolved(resolved) => Self {
                resolved: true,
                declaring_class: Some(resolved.unit.name.clone()),
                access: Some(resolved.access().bits()),
                failure: None,
            },
            Resolution::Failed(failure) => Self::failed(&failure.to_string()),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn print_stats(stats: &CallGraphStats) {
    println!("call graph:");
    println!("  classes: {}", stats.classes);
    println!("  vertices: {}", stats.vertices);
    println!("  edges: {}", stats.edges);
    println!("  unresolved_owners: {}", stats.unresolved_owners);
    println!("  unresolved_calls: {}", stats.unresolved_calls);
}
