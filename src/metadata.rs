//! About.xml metadata extraction. One `ModMetaData` is built per package
//! directory; malformed content degrades to diagnostics and defaults, only
//! missing structure (no About folder, no About.xml) skips the package.

use crate::{
    diag::Diagnostics,
    entry::{read_dir_entries, EntryError, EntryRef},
    verse, xml,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Game versions with their own dependency lists, newest first.
pub const KNOWN_VERSIONS: [&str; 5] = ["1.4", "1.3", "1.2", "1.1", "1.0"];
pub const CURRENT_VERSION: &str = "1.4";

/// Case-normalized package identifier; the ModMap key. Always non-empty,
/// always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(PackageId(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Undefined,
    OfficialFolder,
    LocalFolder,
    WorkshopFolder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModDependency {
    pub package_id: PackageId,
    pub display_name: Option<String>,
    pub steam_workshop_url: Option<String>,
    pub download_url: Option<String>,
}

/// Immutable once parsed. `package_id` keeps the descriptor's casing; map
/// insertion normalizes through `PackageId`.
#[derive(Debug, Clone, Serialize)]
pub struct ModMetaData {
    pub content_source: ContentSource,
    pub package_id: String,
    pub name: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub unversioned_dependencies: Option<Vec<ModDependency>>,
    pub dependencies_by_version: Option<BTreeMap<String, Vec<ModDependency>>>,
    pub load_after: Option<Vec<PackageId>>,
    pub load_before: Option<Vec<PackageId>>,
    pub workshop_folder_name: Option<String>,
}

impl ModMetaData {
    /// Dependency list for one game version, falling back to the
    /// unversioned list when no versioned one exists.
    pub fn dependencies_for_version(&self, version: &str) -> Option<&[ModDependency]> {
        self.dependencies_by_version
            .as_ref()
            .and_then(|by_version| by_version.get(version))
            .or(self.unversioned_dependencies.as_ref())
            .map(Vec::as_slice)
    }
}

pub type ModMap = HashMap<PackageId, ModMetaData>;

/// Parse one package directory. Structural absence returns `Ok(None)` after
/// a diagnostic; passing a non-directory entry is a contract violation and
/// fails loudly, as do I/O errors.
pub async fn parse_mod(
    content_source: ContentSource,
    package_dir: &EntryRef,
    diag: &mut Diagnostics,
) -> Result<Option<ModMetaData>, EntryError> {
    if !package_dir.is_dir() {
        return Err(EntryError::NotADirectory(package_dir.name().to_string()));
    }

    let folder_name = package_dir.name().to_string();
    let alt_id = match content_source {
        ContentSource::WorkshopFolder => format!("Workshop mod {folder_name}"),
        _ => folder_name.clone(),
    };

    // Exact-case lookup, mirroring the game's About/About.xml resolution.
    let children = read_dir_entries(package_dir).await?;
    let Some(about_dir) = children.iter().find(|entry| entry.name() == "About") else {
        diag.error(&alt_id, "no About folder found");
        return Ok(None);
    };
    if !about_dir.is_dir() {
        diag.error(&alt_id, "About/ is not a directory");
        return Ok(None);
    }

    let about_children = read_dir_entries(about_dir).await?;
    let Some(about_xml) = about_children
        .iter()
        .find(|entry| entry.name() == "About.xml")
    else {
        diag.error(&alt_id, "no About/About.xml found");
        return Ok(None);
    };
    if !about_xml.is_file() {
        diag.error(&alt_id, "About/About.xml is not a file");
        return Ok(None);
    }

    let text = about_xml.read_text().await?;
    Ok(Some(parse_about_xml(
        content_source,
        &folder_name,
        &text,
        diag,
    )))
}

/// Field extraction from About.xml text. Never fails: missing fields get
/// defaults or synthesized values, everything irregular goes to `diag`.
pub fn parse_about_xml(
    content_source: ContentSource,
    folder_name: &str,
    text: &str,
    diag: &mut Diagnostics,
) -> ModMetaData {
    let doc = xml::parse(text);
    let owned_root;
    let root = match doc.root() {
        Some(root) => root,
        None => {
            owned_root = xml::Element::new("");
            &owned_root
        }
    };

    let name = match first_text(root, "name") {
        Some(name) => name,
        None => {
            let name = match content_source {
                ContentSource::WorkshopFolder => format!("Workshop mod {folder_name}"),
                _ => folder_name.to_string(),
            };
            diag.warn(&name, "no <name/> found");
            name
        }
    };

    if root.name != "ModMetaData" {
        diag.error(&name, "no <ModMetaData/> found");
    }

    let package_id = first_text_max_one(root, "packageId", &name, diag);
    let author = first_text_max_one(root, "author", &name, diag);
    let description = first_text_max_one(root, "description", &name, diag);

    let package_id = match package_id {
        Some(id) => id,
        None => {
            verse::synthesize_package_id(&name, author.as_deref(), description.as_deref(), diag)
        }
    };

    let unversioned_dependencies = expect_max_one(root, "modDependencies", &package_id, diag)
        .map(|el| parse_dependencies(&package_id, el, diag));

    let dependencies_by_version = expect_max_one(root, "modDependenciesByVersion", &package_id, diag)
        .map(|by_version| {
            let mut out = BTreeMap::new();
            for version in KNOWN_VERSIONS {
                let tag = format!("v{version}");
                if let Some(el) = expect_max_one(by_version, &tag, &package_id, diag) {
                    out.insert(version.to_string(), parse_dependencies(&package_id, el, diag));
                }
            }
            out
        });

    let load_after =
        expect_max_one(root, "loadAfter", &package_id, diag).map(parse_package_id_list);
    let load_before =
        expect_max_one(root, "loadBefore", &package_id, diag).map(parse_package_id_list);

    let workshop_folder_name = match content_source {
        ContentSource::WorkshopFolder => Some(folder_name.to_string()),
        _ => None,
    };

    ModMetaData {
        content_source,
        package_id,
        name,
        author,
        description,
        unversioned_dependencies,
        dependencies_by_version,
        load_after,
        load_before,
        workshop_folder_name,
    }
}

/// Scan a mods directory (one subdirectory per package) into a fresh
/// ModMap. Keys are lowercased; a repeated key keeps the later entry.
pub async fn build_mod_map(
    content_source: ContentSource,
    mods_dir: &EntryRef,
    diag: &mut Diagnostics,
) -> Result<ModMap, EntryError> {
    let mut map = ModMap::new();
    for entry in read_dir_entries(mods_dir).await? {
        if !entry.is_dir() {
            continue;
        }
        let Some(meta) = parse_mod(content_source, &entry, diag).await? else {
            continue;
        };
        let Some(key) = PackageId::new(&meta.package_id) else {
            diag.error(entry.name(), "empty packageId after parsing");
            continue;
        };
        if map.contains_key(&key) {
            diag.warn(key.as_str(), "duplicate packageId; keeping the later entry");
        }
        map.insert(key, meta);
    }
    Ok(map)
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn first_text(parent: &xml::Element, tag: &str) -> Option<String> {
    parent.first_child(tag).and_then(|el| non_empty(el.text()))
}

fn first_text_max_one(
    parent: &xml::Element,
    tag: &str,
    context: &str,
    diag: &mut Diagnostics,
) -> Option<String> {
    expect_max_one(parent, tag, context, diag).and_then(|el| non_empty(el.text()))
}

/// First direct child with the given tag; warns when more than one exists.
fn expect_max_one<'a>(
    parent: &'a xml::Element,
    tag: &str,
    context: &str,
    diag: &mut Diagnostics,
) -> Option<&'a xml::Element> {
    let mut matches = parent.children.iter().filter_map(|node| match node {
        xml::Node::Element(el) if el.name == tag => Some(el),
        _ => None,
    });
    let first = matches.next();
    if matches.next().is_some() {
        diag.error(
            context,
            format!("more than one <{tag}/> found in <{}/>", parent.name),
        );
    }
    first
}

fn parse_dependencies(
    context: &str,
    list: &xml::Element,
    diag: &mut Diagnostics,
) -> Vec<ModDependency> {
    let mut out = Vec::new();
    for (index, li) in list.child_elements("li").enumerate() {
        let package_id = first_text(li, "packageId");
        let display_name = first_text(li, "displayName");

        let Some(package_id) = package_id.as_deref().and_then(PackageId::new) else {
            let label = display_name.unwrap_or_else(|| format!("№.{index}"));
            diag.error(context, format!("dependency '{label}' has no <packageId/>"));
            continue;
        };
        if display_name.is_none() {
            diag.warn(
                context,
                format!("dependency '{package_id}' has no <displayName/>"),
            );
        }

        out.push(ModDependency {
            package_id,
            display_name,
            steam_workshop_url: first_text(li, "steamWorkshopUrl"),
            download_url: first_text(li, "downloadUrl"),
        });
    }
    out
}

fn parse_package_id_list(list: &xml::Element) -> Vec<PackageId> {
    list.child_elements("li")
        .filter_map(|li| PackageId::new(&li.text()))
        .collect()
}
