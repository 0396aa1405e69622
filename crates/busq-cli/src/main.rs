mod config;
mod router;

use anyhow::Context;
use busq::QueueWorkflow;
use clap::{Parser, Subcommand};
use config::BusArgs;
use std::sync::Arc;

#[tokio::main]
pub async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = Cli::parse().run().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

#[derive(Debug, Parser)]
#[command(name = "busq")]
#[command(about = "ensure a queue exists, publish a message to it and drain it", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    bus: BusArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve GET /queue over HTTP
    Serve {
        #[arg(long, default_value = "0.0.0.0", env = "BUSQ_HOST")]
        host: String,

        #[arg(short, long, default_value_t = 8080, env = "BUSQ_PORT")]
        port: u16,
    },
    /// Run the workflow once and print the report
    Run {
        /// Print the report as a JSON array of lines
        #[arg(long, action)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let workflow = Arc::new(QueueWorkflow::new(self.bus.bus().await, self.bus.settings()));

        match self.command {
            Commands::Serve { host, port } => {
                let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                    .await
                    .with_context(|| format!("failed to bind {host}:{port}"))?;
                log::info!(
                    "serving queue {} on http://{}",
                    workflow.settings().queue_name,
                    listener.local_addr()?
                );
                axum::serve(listener, router::create_router(workflow))
                    .await
                    .context("server error")?;
            }
            Commands::Run { json } => {
                let report = workflow.run().await;
                if json {
                    println!("{}", serde_json::to_string(&report)?);
                } else {
                    print!("{report}");
                }
            }
        }

        Ok(())
    }
}
