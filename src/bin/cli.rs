//! A thin command-line wrapper over [`graphdb::GraphDb`] for manual testing
//! and inspection — a single binary driving the library's public API,
//! nothing more.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use graphdb::{Config, Direction, GraphDb};

#[derive(Parser)]
#[command(name = "graphdb-cli", about = "Inspect and mutate a graphdb database")]
struct Cli {
    /// Path prefix the four on-disk files are created/opened under.
    #[arg(short, long, default_value = "db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a node with the given label and print its id.
    CreateNode { label: u64 },
    /// Create a relationship between two existing nodes and print its id.
    CreateRel {
        from: u64,
        to: u64,
        #[arg(default_value_t = 1.0)]
        weight: f64,
        #[arg(default_value_t = 0)]
        label: u64,
    },
    /// Print a node and every relationship incident to it.
    Show { node: u64 },
    /// Print buffer pool pin/unpin counters and per-file read/write counts.
    Stats,
}

fn main() -> graphdb::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config::new(&cli.db);
    let mut db = GraphDb::create(config)?;

    match cli.command {
        Command::CreateNode { label } => {
            let id = db.create_node(label)?;
            println!("{id}");
        }
        Command::CreateRel { from, to, weight, label } => {
            let id = db.create_relationship(from, to, weight, label)?;
            println!("{id}");
        }
        Command::Show { node } => {
            let rec = db.read_node(node)?;
            println!(
                "node {} label={} degree_zero={}",
                rec.id,
                rec.label,
                rec.degree_is_zero()
            );
            for rel in db.expand(node, Direction::Both)? {
                println!(
                    "  rel {} {} -> {} weight={} label={}",
                    rel.id, rel.source_node, rel.target_node, rel.weight, rel.label
                );
            }
        }
        Command::Stats => {
            println!("pins={} unpins={}", db.num_pins(), db.num_unpins());
            for kind in graphdb::physical_database::FileKind::ALL {
                let counters = db.file_counters(kind);
                println!("{kind:?}: reads={} writes={}", counters.reads, counters.writes);
            }
        }
    }

    db.close()?;
    Ok(())
}
