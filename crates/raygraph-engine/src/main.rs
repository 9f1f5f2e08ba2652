use anyhow::Context;
use clap::{Arg, ArgAction, Command, value_parser};
use raygraph_engine::{outcome_table, SimEngine};
use raygraph_model::{prepare, EdgeSpec, NodeSpec, RunConfig};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// On-disk graph description: the same node/edge lists the editor emits
#[derive(Debug, Deserialize)]
struct GraphFile {
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    edges: Vec<EdgeSpec>,
}

fn load_graph_file(path: &str) -> anyhow::Result<GraphFile> {
    let data = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {path}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Command::new("raygraph")
        .version("0.1.0")
        .about("Monte Carlo simulation over probability graphs")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Run a simulation batch and print ranked outcomes")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .help("Graph description JSON ({ nodes, edges })"),
                )
                .arg(
                    Arg::new("trials")
                        .long("trials")
                        .default_value("10000")
                        .value_parser(value_parser!(u64))
                        .help("Number of trials (rays) to run"),
                )
                .arg(
                    Arg::new("frontier-cap")
                        .long("frontier-cap")
                        .default_value("0")
                        .value_parser(value_parser!(u64))
                        .help("Max nodes processed per trial; 0 = unbounded"),
                )
                .arg(
                    Arg::new("progress")
                        .long("progress")
                        .action(ArgAction::SetTrue)
                        .help("Print progress snapshots as they arrive"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Build and normalize a graph, printing its distributions")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .help("Graph description JSON ({ nodes, edges })"),
                ),
        );

    match cli.get_matches().subcommand() {
        Some(("run", args)) => {
            let input = args.get_one::<String>("input").expect("required");
            let trials = *args.get_one::<u64>("trials").expect("defaulted");
            let frontier_cap = *args.get_one::<u64>("frontier-cap").expect("defaulted");
            let show_progress = args.get_flag("progress");

            let file = load_graph_file(input)?;
            let engine = SimEngine::new();
            let graph = engine.build_graph(&file.nodes, &file.edges)?;

            let config = RunConfig::new(trials).with_frontier_cap(frontier_cap);
            let summary = engine
                .run_with_progress(graph, config, |snapshot| {
                    if show_progress {
                        println!(
                            "progress: {} trials, {} node visits",
                            snapshot.trials_completed, snapshot.total_visits
                        );
                    }
                })
                .await?;

            println!();
            println!(
                "Completed {} trials ({} node visits){}",
                summary.trials_completed,
                summary.total_visits,
                if summary.stopped { " [stopped]" } else { "" }
            );
            println!();
            println!("{:<24} {:>12} {:>10}", "node", "hits", "fraction");

            let snapshot = engine
                .latest_snapshot()
                .context("run produced no snapshot")?;
            for row in outcome_table(&snapshot.graph, summary.trials_completed) {
                println!("{:<24} {:>12} {:>9.4}", row.label, row.hits, row.fraction);
            }
        }
        Some(("check", args)) => {
            let input = args.get_one::<String>("input").expect("required");
            let file = load_graph_file(input)?;

            let mut graph = raygraph_model::build_graph(&file.nodes, &file.edges)?;
            prepare(&mut graph);

            println!("{} nodes, root: {}", graph.node_count(), graph.node(graph.root()).label);
            for node in graph.nodes() {
                println!();
                println!("{} ({})", node.label, node.id);
                for branch in &node.branches {
                    println!(
                        "  {:<20} p = {:.6}  -> {} successor(s)",
                        branch.label,
                        branch.weight,
                        branch.next.len()
                    );
                }
                if node.error_term > 0.0 {
                    println!("  {:<20} p = {:.6}", "(uncertainty)", node.error_term);
                }
            }
        }
        _ => unreachable!("arg_required_else_help"),
    }

    Ok(())
}
