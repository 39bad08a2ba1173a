// modgraph/src/cli/order.rs
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use colored::Colorize;
use modgraph_common::config::Config;
use modgraph_common::error::Result;
use modgraph_common::model::RequiredModule;
use modgraph_core::ModuleResolver;
use serde::Serialize;

use super::display_path;

#[derive(Args, Debug)]
pub struct Order {
    /// Entry files to resolve from
    #[arg(required = true)]
    pub entries: Vec<PathBuf>,

    /// Emit the bundle order as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModuleRecord<'a> {
    module_name: &'a str,
    lookup_name: &'a str,
    filename: String,
    kind: &'static str,
    requires: Vec<String>,
}

fn kind(module: &RequiredModule) -> &'static str {
    if module.is_json() {
        "json"
    } else if module.is_script() {
        "script"
    } else {
        "asset"
    }
}

impl Order {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let start_time = Instant::now();
        let resolver = ModuleResolver::new(config.clone())?;
        let graph = resolver.resolve_entries(&self.entries).await?;
        let duration = start_time.elapsed();

        if self.json {
            let records: Vec<_> = graph
                .modules
                .iter()
                .map(|module| ModuleRecord {
                    module_name: &module.module_name,
                    lookup_name: &module.lookup_name,
                    filename: module
                        .filename()
                        .map(|f| display_path(config, f))
                        .unwrap_or_default(),
                    kind: kind(module),
                    requires: module
                        .required_modules()
                        .iter()
                        .filter_map(|child| child.filename())
                        .map(|f| display_path(config, f))
                        .collect(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            for module in &graph.modules {
                let Some(filename) = module.filename() else {
                    continue;
                };
                println!("{}", display_path(config, filename));
            }
        }

        eprintln!(
            "{} {} modules in {}",
            "Resolved".green().bold(),
            graph.modules.len(),
            humantime::format_duration(duration)
        );
        Ok(())
    }
}
