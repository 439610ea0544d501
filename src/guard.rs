use clap::ValueEnum;
use serde::Serialize;

use crate::matchers::{self, CREATE_WATCH_SYMBOL, FORK_SYMBOL};
use crate::tree::SourceTree;

/// The two supported rewrites. CreateWatch declares an explicit dependency on
/// Fork: its match pattern is the `testKit.fork` destructuring shape that the
/// Fork rewrite produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationKind {
    /// `const scope = fork(...)` -> `const { scope } = testKit.fork(...)`.
    Fork,
    /// `createWatch({ unit, fn })` -> `const <fn> = watcher(<unit>);`.
    CreateWatch,
}

impl MigrationKind {
    pub fn priority(self) -> u8 {
        match self {
            Self::Fork => 1,
            Self::CreateWatch => 2,
        }
    }

    pub fn depends_on(self) -> Option<MigrationKind> {
        match self {
            Self::Fork => None,
            Self::CreateWatch => Some(Self::Fork),
        }
    }
}

/// Migrations this file needs, ordered so every rule runs after the rules it
/// depends on.
pub fn required_migrations(tree: &SourceTree) -> Vec<MigrationKind> {
    let Some(import) = matchers::effector_import(tree) else {
        return Vec::new();
    };

    let mut migrations = Vec::new();
    if import.has_named(FORK_SYMBOL) {
        migrations.push(MigrationKind::Fork);
    }
    if import.has_named(CREATE_WATCH_SYMBOL) {
        migrations.push(MigrationKind::CreateWatch);
    }

    migrations.sort_by_key(|migration| migration.priority());
    debug_assert!(dependencies_satisfied(&migrations));
    migrations
}

/// True when no migration in `order` runs before a dependency that is also
/// part of `order`.
pub fn dependencies_satisfied(order: &[MigrationKind]) -> bool {
    order.iter().enumerate().all(|(index, migration)| {
        migration.depends_on().is_none_or(|dependency| {
            !order.contains(&dependency) || order[..index].contains(&dependency)
        })
    })
}
