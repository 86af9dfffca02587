//! `strata check`: validate a design's records against each other.
//!
//! Confirms the placement refers to this exact packing, that every net
//! endpoint lies on the grid and every sink names a placed element, that the
//! packing and placement agree on sites and planes, and that every net's
//! Steiner tree reaches all its terminals.

use serde_json::json;
use strata_diagnostics::diagnostic::FATAL;
use strata_diagnostics::{Diagnostic, DiagnosticSink, Locus};
use strata_planes::records::packing_checksum;
use strata_planes::{steiner_oracle, Design, NetCounts, Optimizer, ProjectedGradient};

use crate::pipeline::{print_json, read_design, render_diagnostics, resolve_config};
use crate::{DesignArgs, GlobalArgs, ReportFormat};

/// Flags a placement that was produced for a different packing.
///
/// An empty checksum in the placement is accepted.
pub fn check_checksum(
    design: &Design,
    sink: &DiagnosticSink,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = &design.placement.packing_checksum;
    if expected.is_empty() {
        return Ok(());
    }
    let actual = packing_checksum(&design.packing)?;
    if *expected != actual {
        sink.emit(
            Diagnostic::error(
                FATAL,
                format!(
                    "placement was made for packing '{}' with checksum {expected}",
                    design.placement.packing_file
                ),
                Locus::Design,
            )
            .with_note(format!("the packing given hashes to {actual}")),
        );
    }
    Ok(())
}

/// Runs the `strata check` command.
///
/// Returns exit code 1 when any error-severity diagnostic was emitted.
pub fn run(args: &DesignArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = resolve_config(global, args, None)?;
    let design = read_design(args)?;
    let sink = DiagnosticSink::new();

    let steiner = steiner_oracle(&config);
    let solver = ProjectedGradient::from(&config.relaxation);
    let prepared = check_checksum(&design, &sink).and_then(|()| {
        Optimizer::new(&config, steiner.as_ref(), &solver)
            .prepare(&design, &sink)
            .map_err(Into::into)
    });
    render_diagnostics(&sink, args.format, global);
    let (state, graphs) = prepared?;

    let counts = NetCounts::of(&graphs);
    let ok = !sink.has_errors();
    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                eprintln!(
                    "   Checked {} sites, {} nodes, {} nets: {}",
                    state.sites().count(),
                    state.node_count(),
                    graphs.len(),
                    if ok { "ok" } else { "failed" }
                );
            }
        }
        ReportFormat::Json => print_json(&json!({
            "ok": ok,
            "sites": state.sites().count(),
            "nodes": state.node_count(),
            "nets": {
                "optimizable": counts.optimizable,
                "local": counts.local,
                "skipped": counts.skipped,
            },
        }))?,
    }
    Ok(if ok { 0 } else { 1 })
}
