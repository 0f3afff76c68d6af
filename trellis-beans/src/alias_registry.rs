//! Alias management: a many-to-one mapping from alternate names to canonical bean names, with
//! cycle detection at registration time.

use crate::error::BeansError;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::RwLock;
use tracing::debug;

/// Registry of alias -> canonical name mappings. Aliases may chain (an alias can point at
/// another alias), but chains are kept acyclic by construction, so [canonical_name](Self::canonical_name)
/// always reaches a fixed point.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    aliases: RwLock<FxHashMap<String, String>>,
    allow_overriding: bool,
}

impl AliasRegistry {
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            aliases: Default::default(),
            allow_overriding,
        }
    }

    /// Registers `alias` for `canonical`. Fails with [BeansError::NameConflict] when the alias
    /// already points elsewhere and overriding is disabled, and with [BeansError::CircularAlias]
    /// when the new entry would close a cycle - including the degenerate self-alias.
    pub fn register_alias(&self, canonical: &str, alias: &str) -> Result<(), BeansError> {
        debug_assert!(!canonical.is_empty() && !alias.is_empty());

        if alias == canonical {
            return Err(BeansError::CircularAlias(alias.to_string()));
        }

        let mut aliases = self.aliases.write();

        if let Some(existing) = aliases.get(alias) {
            if existing == canonical {
                return Ok(());
            }

            if !self.allow_overriding {
                return Err(BeansError::NameConflict(alias.to_string()));
            }

            debug!(alias, old = %existing, new = canonical, "Overriding alias registration.");
        }

        if Self::chain_reaches(&aliases, canonical, alias) {
            return Err(BeansError::CircularAlias(alias.to_string()));
        }

        aliases.insert(alias.to_string(), canonical.to_string());
        Ok(())
    }

    /// Removes a registered alias, failing with [BeansError::UnknownAlias] when absent.
    pub fn remove_alias(&self, alias: &str) -> Result<(), BeansError> {
        self.aliases
            .write()
            .remove(alias)
            .map(|_| ())
            .ok_or_else(|| BeansError::UnknownAlias(alias.to_string()))
    }

    /// Whether the given name is a registered alias.
    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.read().contains_key(name)
    }

    /// Follows the alias chain from `name` to its fixed point; returns the input when it is not
    /// an alias. The walk is bounded because registration keeps chains acyclic.
    pub fn canonical_name(&self, name: &str) -> String {
        let aliases = self.aliases.read();
        let mut current = name;
        while let Some(next) = aliases.get(current) {
            current = next;
        }
        current.to_string()
    }

    /// All aliases pointing - directly or through other aliases - at `canonical`.
    pub fn aliases_of(&self, canonical: &str) -> Vec<String> {
        let aliases = self.aliases.read();
        let mut result = vec![];
        Self::collect_aliases(&aliases, canonical, &mut result);
        result
    }

    fn collect_aliases(aliases: &FxHashMap<String, String>, target: &str, result: &mut Vec<String>) {
        for (alias, canonical) in aliases {
            if canonical == target {
                Self::collect_aliases(aliases, alias, result);
                result.push(alias.clone());
            }
        }
    }

    /// Whether following the existing chain from `start` reaches `needle`.
    fn chain_reaches(aliases: &FxHashMap<String, String>, start: &str, needle: &str) -> bool {
        let mut visited = FxHashSet::default();
        let mut current = start;
        while let Some(next) = aliases.get(current) {
            if next == needle {
                return true;
            }
            if !visited.insert(next.clone()) {
                break;
            }
            current = next;
        }
        false
    }
}
