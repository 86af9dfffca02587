//! Steiner-tree oracles.
//!
//! The graph builder only needs a topology over a net's distinct coordinates:
//! a wirelength estimate and coordinate-pair edges, possibly through junction
//! points that are not terminals. [`RectilinearMst`] computes one in process;
//! [`SteinerCommand`] delegates to an external tool over a line protocol.

use crate::state::Coord;
use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::UnGraph;
use std::io::{self, Write};
use std::process::{Command, Stdio};

/// A Steiner topology over a set of terminals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SteinerTree {
    /// Estimated total wirelength.
    pub wirelength: u32,
    /// Tree edges. Endpoints that are not terminals are junctions.
    pub edges: Vec<(Coord, Coord)>,
}

/// Why an oracle could not produce a tree.
#[derive(Debug, thiserror::Error)]
pub enum SteinerFailure {
    /// The external program could not be started or talked to.
    #[error("I/O with '{program}' failed: {source}")]
    Io {
        /// Program name.
        program: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The external program exited unsuccessfully.
    #[error("'{program}' exited with {status}")]
    Exit {
        /// Program name.
        program: String,
        /// Exit status description.
        status: String,
    },

    /// The program's output did not follow the line protocol.
    #[error("malformed output line {line}: '{text}'")]
    Protocol {
        /// 1-based output line.
        line: usize,
        /// Offending text.
        text: String,
    },
}

/// Computes a Steiner topology for a set of distinct coordinates.
pub trait SteinerOracle {
    /// Returns the tree spanning `terminals` (at least two, all distinct).
    fn tree(&self, terminals: &[Coord]) -> Result<SteinerTree, SteinerFailure>;
}

/// In-process rectilinear tree: a Manhattan minimum spanning tree whose
/// diagonal edges are bent through an L-shaped corner junction.
#[derive(Debug, Clone, Copy, Default)]
pub struct RectilinearMst;

impl SteinerOracle for RectilinearMst {
    fn tree(&self, terminals: &[Coord]) -> Result<SteinerTree, SteinerFailure> {
        let mut graph: UnGraph<Coord, u32> = UnGraph::default();
        let indices: Vec<_> = terminals.iter().map(|&c| graph.add_node(c)).collect();
        for (i, &a) in indices.iter().enumerate() {
            for &b in &indices[i + 1..] {
                graph.add_edge(a, b, terminals[a.index()].manhattan(terminals[b.index()]));
            }
        }

        let mut tree = SteinerTree::default();
        for element in min_spanning_tree(&graph) {
            let Element::Edge {
                source,
                target,
                weight,
            } = element
            else {
                continue;
            };
            let (from, to) = (terminals[source], terminals[target]);
            tree.wirelength += weight;
            if from.x == to.x || from.y == to.y {
                tree.edges.push((from, to));
            } else {
                let corner = Coord::new(to.x, from.y);
                tree.edges.push((from, corner));
                tree.edges.push((corner, to));
            }
        }
        Ok(tree)
    }
}

/// An external Steiner tool.
///
/// The tool receives one `x y` line per terminal on stdin and must print the
/// wirelength on its first line followed by one `x1 y1 x2 y2` line per edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteinerCommand {
    /// Program to run.
    pub program: String,
    /// Arguments passed before any input.
    pub args: Vec<String>,
}

impl SteinerCommand {
    /// Builds a command from `[program, args...]`; `None` if empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn io_failure(&self, source: io::Error) -> SteinerFailure {
        SteinerFailure::Io {
            program: self.program.clone(),
            source,
        }
    }
}

impl SteinerOracle for SteinerCommand {
    fn tree(&self, terminals: &[Coord]) -> Result<SteinerTree, SteinerFailure> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.io_failure(e))?;

        let mut input = String::new();
        for c in terminals {
            input.push_str(&format!("{} {}\n", c.x, c.y));
        }
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|e| self.io_failure(e))?;
        }
        let output = child.wait_with_output().map_err(|e| self.io_failure(e))?;
        if !output.status.success() {
            return Err(SteinerFailure::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }
        parse_tree(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses the tool's output: wirelength line, then edge lines.
pub fn parse_tree(text: &str) -> Result<SteinerTree, SteinerFailure> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());
    let malformed = |line: usize, text: &str| SteinerFailure::Protocol {
        line,
        text: text.to_string(),
    };

    let (line, first) = lines.next().ok_or_else(|| malformed(1, ""))?;
    let wirelength = first.parse().map_err(|_| malformed(line, first))?;
    let mut edges = Vec::new();
    for (line, text) in lines {
        let fields: Vec<i32> = text
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| malformed(line, text))?;
        let [x1, y1, x2, y2] = fields[..] else {
            return Err(malformed(line, text));
        };
        edges.push((Coord::new(x1, y1), Coord::new(x2, y2)));
    }
    Ok(SteinerTree { wirelength, edges })
}
