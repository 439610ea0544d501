use crate::error::KitmigError;
use crate::guard::{self, MigrationKind};
use crate::tree::SourceTree;

mod create_watch;
mod fork;

pub use create_watch::migrate as migrate_create_watch;
pub use fork::migrate as migrate_fork;

/// Runs every migration the guard detects (optionally narrowed to `only`)
/// in dependency order and reports whether the tree changed.
pub fn run_migrations(tree: &mut SourceTree, only: &[MigrationKind]) -> Result<bool, KitmigError> {
    let mut migrations = guard::required_migrations(tree);
    if !only.is_empty() {
        migrations.retain(|migration| only.contains(migration));
    }
    debug_assert!(guard::dependencies_satisfied(&migrations));

    let mut changed = false;
    for migration in migrations {
        changed = match migration {
            MigrationKind::Fork => fork::migrate(tree)?,
            MigrationKind::CreateWatch => create_watch::migrate(tree)?,
        } || changed;
    }

    Ok(changed)
}
