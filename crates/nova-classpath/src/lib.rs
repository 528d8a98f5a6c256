//! Loading class directories, jars and jmods into call graph code units.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use nova_callgraph::{ClassUnit, Resource};
use nova_classfile::ClassFile;

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("classfile error in {location}: {source}")]
    ClassFile {
        location: String,
        #[source]
        source: nova_classfile::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClasspathEntry {
    ClassDir(PathBuf),
    Jar(PathBuf),
    Jmod(PathBuf),
}

impl ClasspathEntry {
    /// Directories are class dirs, `*.jmod` files are jmods, anything else is read as a jar.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            ClasspathEntry::ClassDir(path)
        } else if path.extension() == Some(OsStr::new("jmod")) {
            ClasspathEntry::Jmod(path)
        } else {
            ClasspathEntry::Jar(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::ClassDir(p) | ClasspathEntry::Jar(p) | ClasspathEntry::Jmod(p) => p,
        }
    }

    /// Every class of the entry, sorted by internal name.
    pub fn load(&self) -> Result<Vec<Arc<ClassUnit>>, ClasspathError> {
        let mut units = match self {
            ClasspathEntry::ClassDir(dir) => load_class_dir(dir)?,
            ClasspathEntry::Jar(path) => load_zip(path, ZipKind::Jar)?,
            ClasspathEntry::Jmod(path) => load_zip(path, ZipKind::Jmod)?,
        };
        units.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!(
            target: "nova.classpath",
            path = %self.path().display(),
            classes = units.len(),
            "loaded classpath entry"
        );
        Ok(units)
    }

    /// [`ClasspathEntry::load`] as a resource named after the entry's path.
    pub fn load_resource(&self) -> Result<Resource, ClasspathError> {
        Ok(Resource::with_classes(
            self.path().display().to_string(),
            self.load()?,
        ))
    }
}

/// Loads `entries` into one resource. Earlier entries win when a class appears twice.
pub fn load_classpath(
    name: impl Into<String>,
    entries: &[ClasspathEntry],
) -> Result<Resource, ClasspathError> {
    let mut resource = Resource::new(name);
    for entry in entries {
        for unit in entry.load()? {
            if resource.get(&unit.name).is_some() {
                tracing::debug!(
                    target: "nova.classpath",
                    class = %unit.name,
                    path = %entry.path().display(),
                    "class shadowed by an earlier classpath entry"
                );
                continue;
            }
            resource.insert(unit);
        }
    }
    Ok(resource)
}

fn is_ignored_class(internal_name: &str) -> bool {
    internal_name == "module-info"
        || internal_name == "package-info"
        || internal_name.ends_with("/package-info")
}

fn parse_unit(
    bytes: &[u8],
    location: impl FnOnce() -> String,
) -> Result<Option<Arc<ClassUnit>>, ClasspathError> {
    let class = ClassFile::parse(bytes).map_err(|source| ClasspathError::ClassFile {
        location: location(),
        source,
    })?;
    if is_ignored_class(&class.this_class) {
        return Ok(None);
    }
    Ok(Some(Arc::new(ClassUnit::from_classfile(class))))
}

fn load_class_dir(dir: &Path) -> Result<Vec<Arc<ClassUnit>>, ClasspathError> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension() != Some(OsStr::new("class")) {
            continue;
        }

        let bytes = std::fs::read(entry.path())?;
        if let Some(unit) = parse_unit(&bytes, || entry.path().display().to_string())? {
            out.push(unit);
        }
    }
    Ok(out)
}

enum ZipKind {
    Jar,
    Jmod,
}

fn load_zip(path: &Path, kind: ZipKind) -> Result<Vec<Arc<ClassUnit>>, ClasspathError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let location = |name: &str| format!("{}!/{name}", path.display());

    match kind {
        ZipKind::Jmod => {
            let mut out = Vec::new();
            for i in 0..archive.len() {
                let mut file = archive.by_index(i)?;
                if !file.is_file() {
                    continue;
                }
                let name = file.name().to_owned();

                // JMODs place class files under `classes/`.
                if !name.ends_with(".class") || !name.starts_with("classes/") {
                    continue;
                }

                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)?;
                if let Some(unit) = parse_unit(&bytes, || location(&name))? {
                    out.push(unit);
                }
            }
            Ok(out)
        }
        ZipKind::Jar => {
            let is_multi_release = jar_is_multi_release(&mut archive);

            // Version-specific classes under `META-INF/versions/<n>/` are only used
            // when the base class is missing, preferring the highest version.
            let mut best: HashMap<String, (u32, Arc<ClassUnit>)> = HashMap::new();

            for i in 0..archive.len() {
                let mut file = archive.by_index(i)?;
                if !file.is_file() {
                    continue;
                }
                let name = file.name().to_owned();

                if !name.ends_with(".class") {
                    continue;
                }

                let mr_version = if is_multi_release {
                    if let Some(rest) = name.strip_prefix("META-INF/versions/") {
                        let Some((version, _path)) = rest.split_once('/') else {
                            continue;
                        };
                        match version.parse::<u32>() {
                            Ok(v) => Some(v),
                            Err(_) => continue,
                        }
                    } else if name.starts_with("META-INF/") {
                        continue;
                    } else {
                        None
                    }
                } else if name.starts_with("META-INF/") {
                    continue;
                } else {
                    None
                };

                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)?;
                let Some(unit) = parse_unit(&bytes, || location(&name))? else {
                    continue;
                };
                let version = mr_version.unwrap_or(0);

                match best.get(&unit.name) {
                    Some((0, _)) => {}
                    Some((existing, _)) if version != 0 && version <= *existing => {}
                    _ => {
                        best.insert(unit.name.clone(), (version, unit));
                    }
                }
            }

            Ok(best.into_values().map(|(_, unit)| unit).collect())
        }
    }
}

fn jar_is_multi_release<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> bool {
    let Ok(mut file) = archive.by_name("META-INF/MANIFEST.MF") else {
        return false;
    };

    let mut manifest = String::new();
    if file.read_to_string(&mut manifest).is_err() {
        return false;
    }

    manifest_is_multi_release(&manifest)
}

fn manifest_is_multi_release(manifest: &str) -> bool {
    for line in manifest.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("Multi-Release") {
            return value.trim().eq_ignore_ascii_case("true");
        }
    }
    false
}
