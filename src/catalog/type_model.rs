// ABOUTME: Explicit type compatibility relation built from declared `extends` chains.
// ABOUTME: Ancestors are flattened once at load time; no compatibility is inferred from names.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::types::TypeName;

use super::error::CatalogError;

/// Every type derives from the root type, so requirements targeting it match anything.
pub const ROOT_TYPE: &str = "tosca.nodes.Root";

/// Declaration of one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TypeDecl {
    #[serde(default)]
    pub extends: Vec<TypeName>,
}

/// The resolved subtype relation.
#[derive(Debug, Clone, Default)]
pub struct TypeModel {
    ancestors: HashMap<TypeName, HashSet<TypeName>>,
}

impl TypeModel {
    /// Flatten declared derivations into ancestor sets.
    ///
    /// Fails on parents that are neither declared nor the root type, and on
    /// derivation cycles.
    pub fn new(declarations: &HashMap<TypeName, TypeDecl>) -> Result<Self, CatalogError> {
        let mut names: Vec<&TypeName> = declarations.keys().collect();
        names.sort();

        let mut ancestors = HashMap::new();
        for name in names {
            let mut path = Vec::new();
            collect_ancestors(name, declarations, &mut ancestors, &mut path)?;
        }

        Ok(Self { ancestors })
    }

    /// Whether a resource of type `actual` can satisfy a requirement for `target`.
    pub fn is_compatible(&self, actual: &TypeName, target: &TypeName) -> bool {
        actual == target
            || target.as_str() == ROOT_TYPE
            || self
                .ancestors
                .get(actual)
                .is_some_and(|set| set.contains(target))
    }

    /// Every proper ancestor of `type_name` (excluding the implicit root).
    pub fn ancestors(&self, type_name: &TypeName) -> Vec<&TypeName> {
        let mut out: Vec<&TypeName> = self
            .ancestors
            .get(type_name)
            .map(|set| set.iter().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn is_declared(&self, type_name: &TypeName) -> bool {
        self.ancestors.contains_key(type_name)
    }
}

fn collect_ancestors(
    name: &TypeName,
    declarations: &HashMap<TypeName, TypeDecl>,
    resolved: &mut HashMap<TypeName, HashSet<TypeName>>,
    path: &mut Vec<TypeName>,
) -> Result<HashSet<TypeName>, CatalogError> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }

    if let Some(start) = path.iter().position(|t| t == name) {
        let mut cycle = path[start..].to_vec();
        cycle.push(name.clone());
        return Err(CatalogError::TypeCycle(cycle));
    }

    let Some(decl) = declarations.get(name) else {
        // Parents are checked before recursing, so this is a declared root type.
        return Ok(HashSet::new());
    };

    path.push(name.clone());
    let mut set = HashSet::new();
    for parent in &decl.extends {
        if parent.as_str() == ROOT_TYPE {
            continue;
        }
        if !declarations.contains_key(parent) {
            return Err(CatalogError::UnknownParentType {
                type_name: name.clone(),
                parent: parent.clone(),
            });
        }
        set.insert(parent.clone());
        set.extend(collect_ancestors(parent, declarations, resolved, path)?);
    }
    path.pop();

    resolved.insert(name.clone(), set.clone());
    Ok(set)
}
