//! Export and import command implementation.
//!
//! Both directions run the same reconciler; only the roles of the two store
//! files are swapped.

use super::prompt::{PromptConfirmer, PromptSelector};
use super::{CliError, Format};
use clap::Args;
use distsync_core::{
    catalog, AutoConfirm, Confirmer, Direction, PassThrough, Reconciler, RunOptions, RunOutcome,
    RunReport, Selector, StoreConfig,
};
use distsync_storage::FileStore;
use std::path::Path;
use tracing::info;

/// Flags shared by `export` and `import`.
#[derive(Debug, Clone, Default, Args)]
pub struct SyncArgs {
    /// Include backends
    #[arg(long)]
    pub backends: bool,

    /// Include examples
    #[arg(long)]
    pub examples: bool,

    /// Include saved queries (user-generated content)
    #[arg(long)]
    pub saved: bool,

    /// Include every entity type
    #[arg(long)]
    pub all: bool,

    /// Clear each type in the target and copy all records
    #[arg(long)]
    pub reset: bool,

    /// Delete target records missing from the origin (update mode only)
    #[arg(long)]
    pub delete: bool,

    /// Choose records interactively before applying
    #[arg(long)]
    pub select: bool,

    /// Show what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Apply without asking for confirmation
    #[arg(long)]
    pub force: bool,
}

impl SyncArgs {
    /// Converts the flags into run options.
    pub fn options(&self, reconciler: &Reconciler) -> RunOptions {
        let mut options = RunOptions::new()
            .reset(self.reset)
            .delete(self.delete)
            .select(self.select)
            .dry_run(self.dry_run);
        if self.all {
            options = options.all(reconciler.schema());
        }
        for (flag, entity) in [
            (self.backends, catalog::BACKENDS),
            (self.examples, catalog::EXAMPLES),
            (self.saved, catalog::SAVED_QUERIES),
        ] {
            if flag {
                options = options.entity(entity);
            }
        }
        options
    }
}

/// Runs `export` or `import`.
pub fn run(
    stores: &StoreConfig,
    direction: Direction,
    args: &SyncArgs,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let reconciler = Reconciler::with_catalog()?;
    let options = args.options(&reconciler);
    // Flag errors come before any file access.
    options.validate(reconciler.schema())?;

    let (from, to) = stores.endpoints(direction);
    let origin = open(from)?;
    let mut target = open(to)?;
    info!(
        direction = direction.as_str(),
        from = %from.display(),
        to = %to.display(),
        "starting run"
    );

    let mut selector: Box<dyn Selector> = if args.select {
        Box::new(PromptSelector::stdio())
    } else {
        Box::new(PassThrough)
    };
    let mut confirmer: Box<dyn Confirmer> = if args.force {
        Box::new(AutoConfirm)
    } else {
        Box::new(PromptConfirmer::stdio())
    };

    let report = reconciler.run(
        &origin,
        &mut target,
        &options,
        selector.as_mut(),
        confirmer.as_mut(),
    )?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print_text_output(&report, args.force),
    }
    Ok(())
}

fn open(path: &Path) -> Result<FileStore, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(CliError::MissingStore {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(FileStore::open(path)?)
}

fn print_text_output(report: &RunReport, forced: bool) {
    match &report.outcome {
        RunOutcome::Preview { plan } => {
            print!("{plan}");
            println!();
            println!("Dry run: nothing written.");
        }
        RunOutcome::Applied { plan, applied } => {
            // Without --force the confirmer already showed the plan.
            if forced || plan.changes() == 0 {
                print!("{plan}");
                println!();
            }
            if applied.written() == 0 && plan.changes() == 0 {
                println!("Nothing to do.");
            } else {
                print!("{applied}");
                println!("Done ({}).", report.run_id);
            }
        }
        RunOutcome::Cancelled { entity, .. } => match entity {
            Some(entity) => println!("Cancelled while selecting {entity}; nothing written."),
            None => println!("Cancelled; nothing written."),
        },
    }
}
