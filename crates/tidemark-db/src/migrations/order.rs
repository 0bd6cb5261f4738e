use std::path::Path;

use tidemark_common::{Result, Sequence};

use super::source::{Migration, load_dir};

/// Migrations sorted ascending by sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.migrations.iter()
    }

    pub fn as_slice(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn sequences(&self) -> Vec<Sequence> {
        self.migrations.iter().map(|m| m.sequence).collect()
    }

    pub fn into_vec(self) -> Vec<Migration> {
        self.migrations
    }
}

impl<'a> IntoIterator for &'a MigrationSet {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.migrations.iter()
    }
}

/// Sort by sequence. The sort is stable, so equal sequences keep their
/// input order.
pub fn order(mut migrations: Vec<Migration>) -> MigrationSet {
    migrations.sort_by_key(|m| m.sequence);
    MigrationSet { migrations }
}

/// Load `dir` and order the result.
pub fn load(dir: &Path) -> Result<MigrationSet> {
    Ok(order(load_dir(dir)?))
}
