//! On-disk jump-table cache (spec.md §4.4, §6).
//!
//! Five decimal integers per table, newline-separated: instruction
//! address, table address, target base, scale, entry count. Advisory only
//! — discovery must be deterministic on a cache miss (spec.md §4.4), so a
//! malformed or missing cache file is never an error, only a `None`.
//! Grounded in `original_source/src/pass/jumptablepass.cpp`'s
//! `saveToFile`/`loadFromFile`.

use std::fs;
use std::path::{Path, PathBuf};

/// One cached jump-table descriptor, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedJumpTable {
    pub instruction_address: u64,
    pub table_address: u64,
    pub target_base: u64,
    pub scale: u8,
    pub entry_count: u32,
}

/// Modules excluded from caching (spec.md §6): the synthetic modules
/// standing in for the rewritten executable itself and for the rewriter's
/// own injected code.
pub fn is_cacheable_module(module_name: &str) -> bool {
    module_name != "module-(executable)" && module_name != "module-(egalito)"
}

pub struct JumpTableCache {
    dir: PathBuf,
}

impl JumpTableCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, module_name: &str) -> PathBuf {
        self.dir.join(format!("{module_name}-jumptable"))
    }

    /// Returns `None` on any cache miss or malformed file; never errors.
    pub fn load(&self, module_name: &str) -> Option<Vec<CachedJumpTable>> {
        if !is_cacheable_module(module_name) {
            return None;
        }
        let text = fs::read_to_string(self.path_for(module_name)).ok()?;
        parse_cache_text(&text)
    }

    pub fn save(&self, module_name: &str, tables: &[CachedJumpTable]) -> std::io::Result<()> {
        if !is_cacheable_module(module_name) {
            return Ok(());
        }
        let mut out = String::new();
        for t in tables {
            out.push_str(&format!(
                "{}\n{}\n{}\n{}\n{}\n",
                t.instruction_address, t.table_address, t.target_base, t.scale, t.entry_count
            ));
        }
        fs::write(self.path_for(module_name), out)
    }
}

fn parse_cache_text(text: &str) -> Option<Vec<CachedJumpTable>> {
    let mut lines = text.lines();
    let mut out = Vec::new();
    loop {
        let instruction_address = match lines.next() {
            Some(l) if !l.is_empty() => l.parse().ok()?,
            Some(_) => continue,
            None => break,
        };
        let table_address = lines.next()?.parse().ok()?;
        let target_base = lines.next()?.parse().ok()?;
        let scale = lines.next()?.parse().ok()?;
        let entry_count = lines.next()?.parse().ok()?;
        out.push(CachedJumpTable {
            instruction_address,
            table_address,
            target_base,
            scale,
            entry_count,
        });
    }
    Some(out)
}

/// Default cache directory convention (spec.md §6 "a conventional cache
/// directory path").
pub fn default_cache_dir() -> PathBuf {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new("/tmp").join("etelf-cache"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("etelf-cache-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let cache = JumpTableCache::new(&dir);
        let tables = vec![CachedJumpTable {
            instruction_address: 0x1000,
            table_address: 0x4000,
            target_base: 0x4000,
            scale: 4,
            entry_count: 7,
        }];
        cache.save("module-libfoo.so", &tables).unwrap();
        let loaded = cache.load("module-libfoo.so").unwrap();
        assert_eq!(loaded, tables);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn excludes_reserved_module_names() {
        assert!(!is_cacheable_module("module-(executable)"));
        assert!(!is_cacheable_module("module-(egalito)"));
        assert!(is_cacheable_module("module-libc.so.6"));
    }

    #[test]
    fn missing_file_is_a_cache_miss_not_an_error() {
        let cache = JumpTableCache::new("/nonexistent/etelf-cache-dir-xyz");
        assert_eq!(cache.load("module-libfoo.so"), None);
    }
}
