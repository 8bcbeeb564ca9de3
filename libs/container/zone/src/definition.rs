// This file is part of zonekit.
//
// zonekit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// zonekit is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with zonekit.  If not, see <http://www.gnu.org/licenses/>.

//! Parses a project's `.zone` definition into a flat list of metadata and
//! asset declarations, recursively absorbing `>include`d definitions.
//!
//! Grammar, one directive per line:
//!
//! ```text
//! // comment
//! key,value
//! >include other_project
//! ```
//!
//! `name`, `game` and `gdt` are singleton keys: the first value wins and any
//! later, conflicting value for the same key is a hard error. `ignore` is
//! repeatable and accumulates. Any other key names an asset kind, with the
//! value naming the asset; these accumulate in declaration order across the
//! whole include tree.

use crate::error::ZoneError;
use search_path::SearchPath;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneDefinition {
    pub name: String,
    pub game: String,
    pub gdt: Option<String>,
    pub ignores: Vec<String>,
    pub assets: Vec<(String, String)>,
}

/// Parses `project`'s `.zone` file (and everything it transitively includes)
/// out of `source`. A project reachable through more than one include path
/// is absorbed exactly once; the second and later visits are silently
/// skipped rather than treated as an error (spec scenario S4).
pub fn parse_definition(project: &str, source: &SearchPath) -> Result<ZoneDefinition, ZoneError> {
    let mut visited = HashSet::new();
    let mut meta: HashMap<String, String> = HashMap::new();
    let mut ignores = Vec::new();
    let mut assets = Vec::new();

    absorb(project, source, &mut visited, &mut meta, &mut ignores, &mut assets)?;

    let game = meta
        .get("game")
        .cloned()
        .ok_or(ZoneError::MissingGame)?;

    Ok(ZoneDefinition {
        name: meta.get("name").cloned().unwrap_or_else(|| project.to_owned()),
        game,
        gdt: meta.get("gdt").cloned(),
        ignores,
        assets,
    })
}

fn absorb(
    project: &str,
    source: &SearchPath,
    visited: &mut HashSet<String>,
    meta: &mut HashMap<String, String>,
    ignores: &mut Vec<String>,
    assets: &mut Vec<(String, String)>,
) -> Result<(), ZoneError> {
    if !visited.insert(project.to_owned()) {
        return Ok(());
    }

    let filename = format!("{project}.zone");
    let bytes = source.read(&filename)?;
    let text = String::from_utf8(bytes.into_owned())
        .map_err(|_| ZoneError::MalformedLine(filename.clone()))?;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if let Some(included) = line.strip_prefix(">include") {
            let included = included.trim();
            if included.is_empty() {
                return Err(ZoneError::MalformedLine(raw_line.to_owned()));
            }
            absorb(included, source, visited, meta, ignores, assets)?;
            continue;
        }

        let Some((key, value)) = line.split_once(',') else {
            return Err(ZoneError::MalformedLine(raw_line.to_owned()));
        };
        let key = key.trim();
        let value = value.trim().to_owned();
        if key.is_empty() || value.is_empty() {
            return Err(ZoneError::MalformedLine(raw_line.to_owned()));
        }

        match key {
            "name" | "game" | "gdt" => insert_singleton(meta, key, value)?,
            "ignore" => ignores.push(value),
            kind => assets.push((kind.to_owned(), value)),
        }
    }

    Ok(())
}

fn insert_singleton(meta: &mut HashMap<String, String>, key: &str, value: String) -> Result<(), ZoneError> {
    match meta.get(key) {
        Some(existing) if existing == &value => Ok(()),
        Some(existing) => Err(ZoneError::ConflictingMetadata {
            key: key.to_owned(),
            first: existing.clone(),
            second: value,
        }),
        None => {
            meta.insert(key.to_owned(), value);
            Ok(())
        }
    }
}
