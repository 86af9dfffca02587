//! Shared pipeline helpers for CLI commands.
//!
//! Configuration resolution, reading the three input records, rendering the
//! diagnostic sink, and writing the two output records together.

use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_config::{OptimizerConfig, Overrides, CONFIG_FILE_NAME};
use strata_diagnostics::{DiagnosticRenderer, DiagnosticSink, JsonRenderer, TerminalRenderer};
use strata_planes::{Design, Realized};

use crate::{DesignArgs, GlobalArgs, ReportFormat};

/// Locates the configuration file to load, if any.
///
/// An explicit `--config` wins; otherwise `strata.toml` next to the packing
/// record is used when present.
pub fn config_path(global: &GlobalArgs, args: &DesignArgs) -> Option<PathBuf> {
    if let Some(path) = &global.config {
        return Some(path.clone());
    }
    let candidate = parent_dir(&args.packing).join(CONFIG_FILE_NAME);
    candidate.is_file().then_some(candidate)
}

/// Loads the configuration and applies command-line overrides.
pub fn resolve_config(
    global: &GlobalArgs,
    args: &DesignArgs,
    passes: Option<Vec<String>>,
) -> Result<OptimizerConfig, Box<dyn Error>> {
    let config = match config_path(global, args) {
        Some(path) => strata_config::load_config(&path)
            .map_err(|e| format!("{}: {e}", path.display()))?,
        None => OptimizerConfig::default(),
    };
    let overrides = Overrides {
        passes,
        steiner_command: args
            .steiner_cmd
            .as_deref()
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect()),
        max_plane: args.max_plane,
    };
    Ok(strata_config::resolve_config(config, &overrides)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let text =
        fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()).into())
}

/// Reads the packing, placement, and net records named on the command line.
pub fn read_design(args: &DesignArgs) -> Result<Design, Box<dyn Error>> {
    Ok(Design {
        packing: read_json(&args.packing)?,
        placement: read_json(&args.placement)?,
        nets: read_json(&args.nets)?,
    })
}

/// Renders the sink's diagnostics to stderr.
///
/// Notes are shown only in verbose mode and quiet mode keeps errors only.
pub fn render_diagnostics(sink: &DiagnosticSink, format: ReportFormat, global: &GlobalArgs) {
    let diagnostics = sink.diagnostics();
    let shown = diagnostics
        .iter()
        .filter(|d| d.severity.shown(global.quiet, global.verbose));

    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in shown {
                eprint!("{}", renderer.render(diag));
            }
            if !global.quiet {
                eprintln!(
                    "   Result: {} error(s), {} warning(s)",
                    sink.error_count(),
                    sink.warning_count()
                );
            }
        }
        ReportFormat::Json => {
            for diag in shown {
                eprint!("{}", JsonRenderer.render(diag));
            }
        }
    }
}

/// Prints a machine-readable report to stdout.
pub fn print_json(value: &impl Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Writes the rewritten packing and placement, both or neither.
///
/// Both records are encoded and staged as temporary files next to their
/// destinations before either destination is touched. Existing destinations
/// are copied aside first; if the second rename fails, the first destination
/// gets its previous content back, or is removed when it did not exist.
pub fn write_outputs(
    realized: &Realized,
    packing_path: &Path,
    placement_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let packing = serde_json::to_vec_pretty(&realized.packing)?;
    let placement = serde_json::to_vec_pretty(&realized.placement)?;

    let mut staged = Vec::with_capacity(2);
    for (bytes, path) in [(packing, packing_path), (placement, placement_path)] {
        let dir = parent_dir(path);
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| format!("cannot stage {}: {e}", path.display()))?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        let previous = if path.is_file() {
            let backup = tempfile::NamedTempFile::new_in(dir)
                .map_err(|e| format!("cannot back up {}: {e}", path.display()))?;
            fs::copy(path, backup.path())
                .map_err(|e| format!("cannot back up {}: {e}", path.display()))?;
            Some(backup)
        } else {
            None
        };
        staged.push((file, previous, path));
    }

    let mut written = Vec::new();
    for (file, previous, path) in staged {
        if let Err(e) = file.persist(path) {
            for (done, previous) in written {
                restore(done, previous);
            }
            return Err(format!("cannot write {}: {}", path.display(), e.error).into());
        }
        written.push((path, previous));
    }
    Ok(())
}

/// Puts back what was at `path` before a failed write.
fn restore(path: &Path, previous: Option<tempfile::NamedTempFile>) {
    let _ = match previous {
        Some(backup) => backup.persist(path).map(drop).map_err(|e| e.error),
        None => fs::remove_file(path),
    };
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use strata_planes::records::{packing_checksum, OPEN};
    use strata_planes::{
        NetConnection, NetTable, PackedBlock, PlacedElement, PlacementRecord, SinkDescriptor,
    };

    fn block(name: &str, instance: &str) -> PackedBlock {
        PackedBlock {
            name: name.into(),
            instance: instance.into(),
            mode: None,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            clocks: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    fn connection(from: (i32, i32, u8), sink: &str, to: (i32, i32, u8)) -> NetConnection {
        NetConnection {
            plane: from.2,
            source_x: from.0,
            source_y: from.1,
            sink: SinkDescriptor {
                block: sink.into(),
                plane: to.2,
            },
            sink_x: to.0,
            sink_y: to.1,
        }
    }

    /// Two logic clusters whose only net is badly stacked.
    pub(crate) fn sample_design() -> Design {
        let mut root = block("top", "FPGA_packed_netlist[0]");
        let mut entries = Vec::new();
        for (index, (name, x, used)) in [("a", 1, 0u8), ("b", 2, 3u8)].into_iter().enumerate() {
            let mut cluster = block(name, &format!("clb[{index}]"));
            for p in 0..8u8 {
                if p == used {
                    let elem = format!("{name}_e{p}");
                    let mut ble = block(&elem, &format!("ble[{p}]"));
                    ble.inputs.insert("cin".into(), OPEN.into());
                    cluster.children.push(ble);
                    entries.push(PlacedElement {
                        name: elem,
                        x,
                        y: 1,
                        plane: p,
                    });
                } else {
                    cluster.children.push(block(OPEN, &format!("ble[{p}]")));
                }
            }
            root.children.push(cluster);
        }
        let placement = PlacementRecord {
            packing_file: "top.net".into(),
            packing_checksum: packing_checksum(&root).unwrap(),
            width: 4,
            height: 4,
            entries,
        };
        let mut nets = NetTable::new();
        nets.insert("n0".into(), vec![connection((1, 1, 0), "b_e3", (2, 1, 3))]);
        Design {
            packing: root,
            placement,
            nets,
        }
    }

    fn write_json(dir: &Path, name: &str, value: &impl Serialize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    /// Writes `design` as three JSON files and returns matching arguments.
    pub(crate) fn write_design(dir: &Path, design: &Design) -> DesignArgs {
        DesignArgs {
            packing: write_json(dir, "top.net.json", &design.packing),
            placement: write_json(dir, "top.place.json", &design.placement),
            nets: write_json(dir, "top.nets.json", &design.nets),
            steiner_cmd: None,
            max_plane: None,
            format: ReportFormat::Text,
        }
    }

    pub(crate) fn global() -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: None,
        }
    }

    #[test]
    fn design_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let design = sample_design();
        let args = write_design(dir.path(), &design);
        assert_eq!(read_design(&args).unwrap(), design);
    }

    #[test]
    fn unreadable_input_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = write_design(dir.path(), &sample_design());
        args.nets = dir.path().join("missing.json");
        let err = read_design(&args).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn config_found_next_to_packing() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = write_design(dir.path(), &sample_design());
        fs::write(dir.path().join(CONFIG_FILE_NAME), "[planes]\nmax_plane = 4\n").unwrap();
        args.steiner_cmd = Some("flute -q".into());
        let config = resolve_config(&global(), &args, Some(vec!["kl".into()])).unwrap();
        assert_eq!(config.planes.max_plane, 4);
        assert_eq!(config.flow.passes, vec![strata_config::PassKind::Partition]);
        assert_eq!(
            config.flow.steiner_command,
            Some(vec!["flute".to_string(), "-q".to_string()])
        );
    }

    #[test]
    fn max_plane_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = write_design(dir.path(), &sample_design());
        fs::write(dir.path().join(CONFIG_FILE_NAME), "[planes]\nmax_plane = 4\n").unwrap();
        args.max_plane = Some(6);
        let config = resolve_config(&global(), &args, None).unwrap();
        assert_eq!(config.planes.max_plane, 6);

        args.max_plane = Some(0);
        assert!(resolve_config(&global(), &args, None).is_err());
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let args = write_design(dir.path(), &sample_design());
        let mut global = global();
        global.config = Some(dir.path().join("nope.toml"));
        assert!(resolve_config(&global, &args, None).is_err());
    }

    #[test]
    fn outputs_written_together() {
        let dir = tempfile::tempdir().unwrap();
        let design = sample_design();
        let realized = Realized {
            packing: design.packing.clone(),
            placement: design.placement.clone(),
            report: strata_planes::RealizationReport {
                sites: 0,
                exchanges: 0,
                checksum: design.placement.packing_checksum.clone(),
            },
        };
        let (pk, pl) = (dir.path().join("o.net.json"), dir.path().join("o.place.json"));
        write_outputs(&realized, &pk, &pl).unwrap();
        assert!(pk.is_file() && pl.is_file());

        let (pk2, pl2) = (
            dir.path().join("o2.net.json"),
            dir.path().join("no_such_dir").join("o2.place.json"),
        );
        assert!(write_outputs(&realized, &pk2, &pl2).is_err());
        assert!(!pk2.exists());
        assert!(!pl2.exists());
    }

    #[test]
    fn failed_write_keeps_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let design = sample_design();
        let realized = Realized {
            packing: design.packing.clone(),
            placement: design.placement.clone(),
            report: strata_planes::RealizationReport {
                sites: 0,
                exchanges: 0,
                checksum: design.placement.packing_checksum.clone(),
            },
        };
        // A non-empty directory in the placement's place makes its rename fail
        // after the packing has been written.
        let taken = dir.path().join("taken");
        fs::create_dir(&taken).unwrap();
        fs::write(taken.join("keep"), "x").unwrap();

        let pk = dir.path().join("o.net.json");
        fs::write(&pk, "previous run").unwrap();
        assert!(write_outputs(&realized, &pk, &taken).is_err());
        assert_eq!(fs::read_to_string(&pk).unwrap(), "previous run");

        let fresh = dir.path().join("fresh.net.json");
        assert!(write_outputs(&realized, &fresh, &taken).is_err());
        assert!(!fresh.exists());
        assert!(taken.join("keep").is_file());
    }
}
