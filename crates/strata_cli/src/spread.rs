//! `strata spread`: report the plane spread of a design.

use std::collections::BTreeMap;

use serde_json::json;
use strata_diagnostics::DiagnosticSink;
use strata_planes::{
    design_spread, net_spread, steiner_oracle, NetCounts, NetStatus, Optimizer,
    ProjectedGradient,
};

use crate::pipeline::{print_json, read_design, render_diagnostics, resolve_config};
use crate::{DesignArgs, GlobalArgs, ReportFormat};

/// Spread of a design, overall and per optimizable net.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadSummary {
    /// Net status counts.
    pub nets: NetCounts,
    /// Design spread.
    pub total: u64,
    /// Non-zero spread of each optimizable net.
    pub per_net: BTreeMap<String, u64>,
}

/// Builds the net graphs of a design and measures them.
pub fn measure(
    args: &DesignArgs,
    global: &GlobalArgs,
    sink: &DiagnosticSink,
) -> Result<SpreadSummary, Box<dyn std::error::Error>> {
    let config = resolve_config(global, args, None)?;
    let design = read_design(args)?;
    let steiner = steiner_oracle(&config);
    let solver = ProjectedGradient::from(&config.relaxation);
    let optimizer = Optimizer::new(&config, steiner.as_ref(), &solver);
    let (state, graphs) = optimizer.prepare(&design, sink)?;

    let per_net = graphs
        .values()
        .filter(|g| g.status() == NetStatus::Optimizable)
        .map(|g| (g.name().to_string(), net_spread(g, &state)))
        .filter(|&(_, spread)| spread > 0)
        .collect();
    Ok(SpreadSummary {
        nets: NetCounts::of(&graphs),
        total: design_spread(&graphs, &state),
        per_net,
    })
}

/// Runs the `strata spread` command.
pub fn run(args: &DesignArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let sink = DiagnosticSink::new();
    let summary = measure(args, global, &sink);
    render_diagnostics(&sink, args.format, global);
    let summary = summary?;

    match args.format {
        ReportFormat::Text => {
            println!(
                "spread {} over {} optimizable nets ({} local, {} skipped)",
                summary.total,
                summary.nets.optimizable,
                summary.nets.local,
                summary.nets.skipped
            );
            if global.verbose {
                let mut worst: Vec<_> = summary.per_net.iter().collect();
                worst.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
                for (name, spread) in worst {
                    println!("  {spread:>8}  {name}");
                }
            }
        }
        ReportFormat::Json => print_json(&json!({
            "spread": summary.total,
            "nets": {
                "optimizable": summary.nets.optimizable,
                "local": summary.nets.local,
                "skipped": summary.nets.skipped,
            },
            "per_net": summary.per_net,
        }))?,
    }
    Ok(0)
}
