use std::{error::Error, process::ExitCode};

use clap::{Parser, Subcommand};
use roster::{
    Client, ClientError, parse_assignments,
    protocol::DEFAULT_PORT,
    storage::{Comparison, FieldMap},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List rows, optionally filtered
    Get {
        table: String,
        /// Constraints, `key=value[, key=value]`
        #[arg(short, long)]
        fields: Option<String>,
        /// Comparison applied to non-text constraints: =, <, > or LIKE
        #[arg(long, default_value = "=")]
        mode: Comparison,
    },
    /// Insert a row
    Add {
        table: String,
        #[arg(short, long)]
        fields: String,
    },
    /// Change columns of one row
    Update {
        table: String,
        id: i64,
        #[arg(short, long)]
        fields: String,
    },
    /// Remove one row
    Delete { table: String, id: i64 },
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let mut client = Client::connect((cli.host.as_str(), cli.port))?;

    let res = match cli.command {
        Command::Get {
            table,
            fields,
            mode,
        } => {
            let constraints = match fields {
                Some(fields) => parse_assignments(&fields)?,
                None => FieldMap::new(),
            };
            client.get(table, mode, constraints).map(|records| {
                for record in &records {
                    println!("{} #{}: {record}", record.table(), record.id());
                }
                println!("{} rows", records.len());
                true
            })
        }
        Command::Add { table, fields } => client.add(table, parse_assignments(&fields)?),
        Command::Update { table, id, fields } => {
            client.update(table, id, parse_assignments(&fields)?)
        }
        Command::Delete { table, id } => client.delete(table, id),
    };

    match res {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => {
            println!("FAILURE");
            Ok(ExitCode::FAILURE)
        }
        Err(ClientError::Server(envelope)) => {
            eprintln!("{envelope}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
