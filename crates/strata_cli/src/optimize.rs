//! `strata optimize`: refine plane assignment and write new records.
//!
//! 1. Resolve configuration (file, then `--passes`, `--steiner-cmd`, `--max-plane`)
//! 2. Read packing, placement, and nets
//! 3. Build net graphs and run the configured refinement passes
//! 4. Realize the assignment and write both output records
//! 5. Render diagnostics and the spread summary

use serde_json::json;
use strata_diagnostics::DiagnosticSink;
use strata_planes::{steiner_oracle, Optimizer, PassReport, ProjectedGradient};

use crate::pipeline::{
    print_json, read_design, render_diagnostics, resolve_config, write_outputs,
};
use crate::{GlobalArgs, OptimizeArgs, ReportFormat};

/// Runs the `strata optimize` command.
///
/// Returns exit code 0 on success. Nothing is written when the run fails.
pub fn run(args: &OptimizeArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let passes = if args.no_refine {
        Some(Vec::new())
    } else {
        args.passes.clone()
    };
    let config = resolve_config(global, &args.design, passes)?;
    let design = read_design(&args.design)?;

    if !global.quiet && args.design.format == ReportFormat::Text {
        eprintln!(
            "  Optimizing {} nets over {} planes ({} passes)",
            design.nets.len(),
            config.planes.max_plane,
            config.flow.passes.len()
        );
    }

    let sink = DiagnosticSink::new();
    let steiner = steiner_oracle(&config);
    let solver = ProjectedGradient::from(&config.relaxation);
    let outcome = Optimizer::new(&config, steiner.as_ref(), &solver).run(&design, &sink);
    render_diagnostics(&sink, args.design.format, global);
    let outcome = outcome?;

    write_outputs(&outcome.realized, &args.out_packing, &args.out_placement)?;

    let report = &outcome.report;
    match args.design.format {
        ReportFormat::Text => {
            if !global.quiet {
                eprintln!(
                    "   Spread: {} -> {} ({} optimizable, {} local, {} skipped nets)",
                    report.initial_spread,
                    report.final_spread,
                    report.nets.optimizable,
                    report.nets.local,
                    report.nets.skipped
                );
                eprintln!(
                    "   Wrote {} and {} ({} sites rewritten)",
                    args.out_packing.display(),
                    args.out_placement.display(),
                    outcome.realized.report.sites
                );
            }
        }
        ReportFormat::Json => {
            let passes: Vec<_> = report
                .passes
                .iter()
                .map(|pass| match pass {
                    PassReport::Partition(p) => json!({
                        "pass": "partition",
                        "iterations": p.iterations,
                        "swaps": p.swaps,
                        "rolled_back": p.rolled_back,
                        "spread": [p.initial_spread, p.final_spread],
                    }),
                    PassReport::Relaxation(r) => json!({
                        "pass": "relaxation",
                        "iterations": r.iterations,
                        "solved_nets": r.solved_nets,
                        "skipped_sites": r.skipped_sites,
                        "rolled_back": r.rolled_back,
                        "spread": [r.initial_spread, r.final_spread],
                    }),
                })
                .collect();
            print_json(&json!({
                "initial_spread": report.initial_spread,
                "final_spread": report.final_spread,
                "nets": {
                    "optimizable": report.nets.optimizable,
                    "local": report.nets.local,
                    "skipped": report.nets.skipped,
                },
                "passes": passes,
                "sites_rewritten": outcome.realized.report.sites,
                "exchanges": outcome.realized.report.exchanges,
                "packing_checksum": outcome.realized.report.checksum,
            }))?;
        }
    }

    Ok(if sink.has_errors() { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{global, sample_design, write_design};
    use crate::DesignArgs;
    use std::path::Path;

    fn optimize_args(dir: &Path, design: DesignArgs) -> OptimizeArgs {
        OptimizeArgs {
            design,
            passes: None,
            no_refine: false,
            out_packing: dir.join("out.net.json"),
            out_placement: dir.join("out.place.json"),
        }
    }

    #[test]
    fn optimize_writes_lower_spread_design() {
        let dir = tempfile::tempdir().unwrap();
        let design = sample_design();
        let args = optimize_args(dir.path(), write_design(dir.path(), &design));
        assert_eq!(run(&args, &global()).unwrap(), 0);

        let out = read_design(&DesignArgs {
            packing: args.out_packing.clone(),
            placement: args.out_placement.clone(),
            nets: args.design.nets.clone(),
            steiner_cmd: None,
            max_plane: None,
            format: ReportFormat::Text,
        })
        .unwrap();
        // The two ends of the only net now sit closer in plane.
        let by_name = out.placement.by_name();
        assert!(by_name["a_e0"].plane.abs_diff(by_name["b_e3"].plane) < 3);
        assert_eq!(
            out.placement.packing_checksum,
            strata_planes::records::packing_checksum(&out.packing).unwrap()
        );
    }

    #[test]
    fn no_refine_reproduces_input() {
        let dir = tempfile::tempdir().unwrap();
        let design = sample_design();
        let mut args = optimize_args(dir.path(), write_design(dir.path(), &design));
        args.no_refine = true;
        assert_eq!(run(&args, &global()).unwrap(), 0);
        let packing: strata_planes::PackedBlock =
            serde_json::from_str(&std::fs::read_to_string(&args.out_packing).unwrap()).unwrap();
        assert_eq!(packing, design.packing);
    }

    #[test]
    fn failed_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut design = sample_design();
        design.placement.entries[0].plane = 5;
        let args = optimize_args(dir.path(), write_design(dir.path(), &design));
        assert!(run(&args, &global()).is_err());
        assert!(!args.out_packing.exists());
        assert!(!args.out_placement.exists());
    }

    #[test]
    fn unknown_pass_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = optimize_args(dir.path(), write_design(dir.path(), &sample_design()));
        args.passes = Some(vec!["anneal".into()]);
        assert!(run(&args, &global()).is_err());
    }
}
