use std::error::Error;
use std::io::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clio::Output;
use gatehouse_model::{split_path, Value};
use gatestore::DocumentStore;

/// Inspect and edit persisted documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Store root directory
    #[clap(long, short)]
    root: PathBuf,

    /// File to write output
    #[clap(long, short, value_parser, default_value = "-")]
    output: Output,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List documents under the root
    List,

    /// Print a whole document
    Dump {
        document: String,

        /// Print as JSON instead of YAML
        #[clap(long)]
        json: bool,
    },

    /// Print the value at a dotted path
    Get { document: String, path: String },

    /// Store a YAML value at a dotted path
    Set {
        document: String,
        path: String,
        value: String,
    },

    /// Remove the value at a dotted path
    Remove { document: String, path: String },
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = Args::parse();
    let mut store = DocumentStore::open(&args.root)?;

    match args.command {
        Command::List => {
            for name in store.documents()? {
                writeln!(args.output, "{name}")?;
            }
        }
        Command::Dump { document, json } => {
            let doc = store.load(&document)?;
            if json {
                serde_json::to_writer_pretty(&mut args.output, doc)?;
                writeln!(args.output)?;
            } else {
                write!(args.output, "{}", serde_yaml::to_string(doc)?)?;
            }
        }
        Command::Get { document, path } => {
            match store.get_value(&document, &split_path(&path))? {
                Some(value) => write!(args.output, "{}", serde_yaml::to_string(value)?)?,
                None => {
                    eprintln!("{document}: no value at {path:?}");
                    std::process::exit(1);
                }
            }
        }
        Command::Set {
            document,
            path,
            value,
        } => {
            let value: Value = serde_yaml::from_str(&value)?;
            store.set_value(&document, &split_path(&path), value)?;
            store.save(&document)?;
        }
        Command::Remove { document, path } => {
            if store.remove_value(&document, &split_path(&path))?.is_none() {
                eprintln!("{document}: no value at {path:?}");
                std::process::exit(1);
            }
            store.save(&document)?;
        }
    }
    Ok(())
}
