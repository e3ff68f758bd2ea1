//! Object definition compiler.
//!
//! `.object` files describe runtime classes in a keyword language. The
//! compiler tokenizes them, links the inheritance forest, sorts it
//! topologically, and emits the class hierarchy, dispatch tables, and
//! per-category event loops as C++ source.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(unused_crate_dependencies)]

pub mod codegen;
pub mod event;
pub mod file;
pub mod keyword;

use std::collections::HashMap;
use std::path::Path;

use ember_common::cache::{AssetCache, CacheRecord, FileCountRecord, StampRecord};
use ember_common::fs::directory_iterate;
use ember_common::hash::{hash64, mix64};
use thiserror::Error;

use crate::event::EVENT_COUNT;
use crate::file::ObjectFile;

/// Cache key of the object file-count record.
const CACHE_KEY_FILE_COUNT: u64 = 0;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("failed to open object file {path}: {err}")]
    Open {
        path: String,
        err: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
    #[error("{0}")]
    Validate(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Program-wide tables populated while parsing individual files.
#[derive(Debug, Default)]
pub struct Registry {
    /// Type-name hash to type name, for duplicate detection.
    pub object_types: HashMap<u32, String>,
    /// Category hash and name, in registration order.
    pub categories: Vec<(u32, String)>,
    pub header_includes: String,
    pub source_includes: String,
}

impl Registry {
    pub fn register_category(&mut self, hash: u32, name: &str) {
        if !self.categories.iter().any(|(h, _)| *h == hash) {
            self.categories.push((hash, name.to_owned()));
        }
    }
}

/// The object compiler: every parsed file plus the resolved ordering.
#[derive(Debug, Default)]
pub struct Objects {
    pub files: Vec<ObjectFile>,
    /// Indices into `files`, parents strictly before children.
    pub sorted: Vec<usize>,
    pub registry: Registry,
    pub file_count: u64,
}

impl Objects {
    /// Creates the compiler with the implicit DEFAULT root registered.
    pub fn new() -> Self {
        let mut objects = Self::default();
        objects.files.push(ObjectFile {
            name: "DEFAULT".to_owned(),
            name_parent: String::new(),
            ..ObjectFile::default()
        });
        objects
    }

    /// Discovers `.object` files and stamps their cache state.
    pub fn gather(
        &mut self,
        dir: &Path,
        recurse: bool,
        cache: &mut AssetCache,
    ) -> Result<usize, ObjectError> {
        let files = directory_iterate(dir, "object", recurse)?;

        for file in &files {
            let key = mix64(
                file.modified_secs(),
                hash64(file.path.display().to_string().as_bytes()),
            );
            if !cache.dirty && !cache.contains(key) {
                cache.dirty = true;
            }
            cache.store(key, CacheRecord::Stamp(StampRecord));
            self.file_count += 1;

            self.files.push(ObjectFile::from_path(file.path.clone()));
        }

        Ok(files.len())
    }

    pub fn parse(&mut self) -> Result<(), ObjectError> {
        for index in 0..self.files.len() {
            let (files, registry) = (&mut self.files, &mut self.registry);
            files[index].parse(registry)?;
        }
        Ok(())
    }

    /// Links parents and children, sorts topologically, propagates events,
    /// and aggregates inherited members.
    pub fn resolve(&mut self) -> Result<(), ObjectError> {
        // Build the inheritance forest.
        for index in 0..self.files.len() {
            if self.files[index].name_parent.is_empty() {
                continue;
            }

            let parent = (0..self.files.len())
                .find(|&p| self.files[p].name == self.files[index].name_parent);

            let Some(parent) = parent else {
                return Err(ObjectError::Validate(format!(
                    "No PARENT({}) exists\n\t > {}",
                    self.files[index].name_parent,
                    self.files[index].path.display()
                )));
            };
            if parent == index {
                return Err(ObjectError::Validate(format!(
                    "OBJECT({}) attempting to inherit itself\n\t > {}",
                    self.files[index].name,
                    self.files[index].path.display()
                )));
            }

            self.files[index].parent = Some(parent);
            self.files[parent].children.push(index);
        }

        // Topological sort from DEFAULT.
        self.sorted.push(0);
        self.files[0].depth = 0;
        self.files[0].visited = true;
        let mut sorted = std::mem::take(&mut self.sorted);
        self.sort_objects(0, 1, &mut sorted)?;
        self.sorted = sorted;

        // Every file must be reachable from DEFAULT.
        if let Some(orphan) = self.files.iter().find(|f| !f.visited) {
            return Err(ObjectError::Validate(format!(
                "OBJECT({}) is not reachable from DEFAULT\n\t > {}",
                orphan.name,
                orphan.path.display()
            )));
        }

        // Aggregate inherited members from the full parent chain.
        for index in 0..self.files.len() {
            let mut parent = self.files[index].parent;
            while let Some(p) = parent {
                let (categories, friends, variables, functions, events) = {
                    let parent_file = &self.files[p];
                    let mut variables = parent_file.public_variable_header.clone();
                    variables.extend(parent_file.protected_variable_header.iter().cloned());
                    let mut functions = parent_file.public_function_header.clone();
                    functions.extend(parent_file.protected_function_header.iter().cloned());
                    let events: Vec<String> = parent_file
                        .events
                        .iter()
                        .filter(|e| !e.header.is_empty())
                        .map(|e| e.header.clone())
                        .collect();
                    (
                        parent_file.categories.clone(),
                        parent_file.friends.clone(),
                        variables,
                        functions,
                        events,
                    )
                };

                let file = &mut self.files[index];
                for category in categories {
                    if !file.categories.contains(&category) {
                        file.categories.push(category);
                    }
                }
                for friend in friends {
                    if !file.friends.contains(&friend) {
                        file.friends.push(friend);
                    }
                }
                for variable in variables {
                    if !file.inherited_variables.contains(&variable) {
                        file.inherited_variables.push(variable);
                    }
                }
                for function in functions {
                    if !file.inherited_functions.contains(&function) {
                        file.inherited_functions.push(function);
                    }
                }
                for event in events {
                    if !file.inherited_events.contains(&event) {
                        file.inherited_events.push(event);
                    }
                }

                parent = self.files[p].parent;
            }
        }

        Ok(())
    }

    /// Depth-first walk placing parents before children and propagating
    /// event flags downwards.
    fn sort_objects(
        &mut self,
        object: usize,
        depth: u16,
        out: &mut Vec<usize>,
    ) -> Result<(), ObjectError> {
        if depth == u16::MAX {
            return Err(ObjectError::Validate(format!(
                "exceeded maximum inheritance depth ({})\n\t > {}",
                u16::MAX,
                self.files[object].path.display()
            )));
        }

        let children = self.files[object].children.clone();
        for child in children {
            if self.files[child].visited {
                continue;
            }

            self.files[child].depth = depth;
            self.files[child].visited = true;

            for event in 0..EVENT_COUNT {
                let (inherits, implements, disabled, manual) = {
                    let e = &self.files[object].events[event];
                    (e.inherits, e.implements, e.disabled, e.manual)
                };
                let child_event = &mut self.files[child].events[event];
                if (inherits || implements) && !disabled && !child_event.inherits {
                    child_event.inherits = true;
                    child_event.manual = manual;
                }
            }

            out.push(child);
            if !self.files[child].children.is_empty() {
                self.sort_objects(child, depth + 1, out)?;
            }
        }

        Ok(())
    }

    pub fn validate(&mut self) -> Result<(), ObjectError> {
        for file in &mut self.files {
            file.validate()?;
        }
        Ok(())
    }

    /// Compares the discovered file count against the cached one; a
    /// mismatch (files added or removed) dirties the whole object cache.
    pub fn cache_validate(&self, cache: &mut AssetCache) {
        match cache.fetch_file_count(CACHE_KEY_FILE_COUNT) {
            Some(count) if count == self.file_count => {}
            _ => cache.dirty = true,
        }

        cache.store(
            CACHE_KEY_FILE_COUNT,
            CacheRecord::FileCount(FileCountRecord {
                count: self.file_count,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::Objects;
    use crate::file::ObjectFile;

    fn parse_sources(sources: &[&str]) -> Objects {
        let mut objects = Objects::new();
        for _ in sources {
            objects.files.push(ObjectFile::default());
        }

        // DEFAULT parses from its embedded definition.
        let (files, registry) = (&mut objects.files, &mut objects.registry);
        files[0].parse(registry).unwrap();

        for (i, source) in sources.iter().enumerate() {
            files[i + 1].parse_buffer(source, registry).unwrap();
        }

        objects
    }

    #[test]
    fn inheritance_chain_sorts_topologically() {
        let mut objects = parse_sources(&[
            "OBJECT( A ) PARENT( DEFAULT )\nPUBLIC int x;",
            "OBJECT( B ) PARENT( A )\nPUBLIC int y;",
        ]);
        objects.resolve().unwrap();
        objects.validate().unwrap();

        let names: Vec<&str> = objects
            .sorted
            .iter()
            .map(|&i| objects.files[i].name.as_str())
            .collect();
        assert_eq!(names, ["DEFAULT", "A", "B"]);

        assert_eq!(objects.files[1].depth, 1);
        assert_eq!(objects.files[2].depth, 2);

        // B inherits A's public variable (and DEFAULT's id).
        let b = &objects.files[2];
        assert!(b.inherited_variables.iter().any(|v| v == "int x;"));
        assert!(b
            .inherited_variables
            .iter()
            .any(|v| v == "ObjectInstance id;"));
    }

    #[test]
    fn missing_parent_is_fatal() {
        let mut objects = parse_sources(&["OBJECT( A ) PARENT( Ghost )"]);
        assert!(objects.resolve().is_err());
    }

    #[test]
    fn self_parent_is_fatal() {
        let mut objects = parse_sources(&["OBJECT( Loop ) PARENT( Loop )"]);
        assert!(objects.resolve().is_err());
    }

    #[test]
    fn event_propagates_to_children() {
        let mut objects = parse_sources(&[
            "OBJECT( A ) PARENT( DEFAULT )\nEVENT_UPDATE\n{\n\tx += 1;\n}",
            "OBJECT( B ) PARENT( A )",
        ]);
        objects.resolve().unwrap();

        use crate::keyword::KW_EVENT_UPDATE;
        let b = &objects.files[2];
        assert!(b.events[KW_EVENT_UPDATE].inherits);
        assert!(!b.events[KW_EVENT_UPDATE].implements);
        assert!(!b.events[KW_EVENT_UPDATE].manual);
    }

    #[test]
    fn disabled_event_does_not_propagate() {
        let mut objects = parse_sources(&[
            "OBJECT( A ) PARENT( DEFAULT )\nEVENT_RENDER DISABLE\n{\n}",
            "OBJECT( B ) PARENT( A )",
        ]);
        objects.resolve().unwrap();

        use crate::keyword::KW_EVENT_RENDER;
        let a = &objects.files[1];
        assert!(a.events[KW_EVENT_RENDER].disabled);
        assert!(!a.events[KW_EVENT_RENDER].null.is_empty());

        let b = &objects.files[2];
        assert!(!b.events[KW_EVENT_RENDER].inherits);
    }

    #[test]
    fn duplicate_object_name_is_fatal() {
        let mut registry = super::Registry::default();
        let mut first = ObjectFile::default();
        first.parse_buffer("OBJECT( Dup )", &mut registry).unwrap();

        let mut second = ObjectFile::default();
        assert!(second.parse_buffer("OBJECT( Dup )", &mut registry).is_err());
    }

    #[test]
    fn write_without_read_is_fatal() {
        let mut objects =
            parse_sources(&["OBJECT( A ) PARENT( DEFAULT )\nWRITE\n{\n\tbuffer << x;\n}"]);
        objects.resolve().unwrap();
        assert!(objects.validate().is_err());
    }

    #[test]
    fn versions_without_serialize_is_fatal() {
        let mut objects =
            parse_sources(&["OBJECT( A ) PARENT( DEFAULT )\nVERSIONS( V1, V2 )"]);
        objects.resolve().unwrap();
        assert!(objects.validate().is_err());
    }

    #[test]
    fn networked_requires_serialization() {
        let mut objects = parse_sources(&["OBJECT( A ) PARENT( DEFAULT )\nNETWORKED( true )"]);
        objects.resolve().unwrap();
        assert!(objects.validate().is_err());
    }
}
