// modgraph/src/cli/tree.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use colored::Colorize;
use modgraph_common::config::Config;
use modgraph_common::error::Result;
use modgraph_common::model::RequiredModule;
use modgraph_core::ModuleResolver;

use super::display_path;

#[derive(Args, Debug)]
pub struct Tree {
    /// Entry files to resolve from
    #[arg(required = true)]
    pub entries: Vec<PathBuf>,
}

impl Tree {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let start_time = Instant::now();
        let resolver = ModuleResolver::new(config.clone())?;
        let graph = resolver.resolve_entries(&self.entries).await?;
        let duration = start_time.elapsed();

        let mut printed = HashSet::new();
        for entry in &graph.entries {
            print_node(config, entry, 0, &mut printed);
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

/// Loaded subtrees are expanded the first time they are reached only.
fn print_node<'a>(
    config: &Config,
    module: &'a RequiredModule,
    depth: usize,
    printed: &mut HashSet<&'a Path>,
) {
    let Some(filename) = module.filename() else {
        return;
    };
    let indent = "  ".repeat(depth);
    let label = format!("{} ({})", module.module_name, display_path(config, filename));

    if module.loaded().is_none() {
        println!("{indent}{}", label.dimmed());
        return;
    }
    if !printed.insert(filename) {
        println!("{indent}{} {}", label, "(seen)".dimmed());
        return;
    }
    println!("{indent}{label}");
    for child in module.required_modules() {
        print_node(config, child, depth + 1, printed);
    }
}
