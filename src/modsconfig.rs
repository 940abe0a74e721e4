//! ModsConfig.xml model and reconciliation. Each `<li>` under
//! `<activeMods>` may carry a trailing comment summarizing the mod's name
//! and dependencies; `reconcile` inserts, updates, or removes those
//! comments from a freshly scanned ModMap and reports whether anything
//! actually changed.

use crate::{
    diag::Diagnostics,
    metadata::{ModMap, ModMetaData, PackageId, CURRENT_VERSION},
    xml::{self, Node},
};

const ROOT_TAG: &str = "ModsConfigData";
const ACTIVE_MODS_TAG: &str = "activeMods";

/// Human-readable annotation content: a mod name and the identifiers it
/// depends on. Formats to `"<name>: <dep1>, <dep2>"`, degrading to the
/// name alone or the identifiers alone when one side is missing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModSummary {
    pub name: Option<String>,
    pub dep_ids: Vec<PackageId>,
}

impl ModSummary {
    pub fn of_mod(meta: &ModMetaData) -> Self {
        let dep_ids = meta
            .dependencies_for_version(CURRENT_VERSION)
            .map(|deps| deps.iter().map(|dep| dep.package_id.clone()).collect())
            .unwrap_or_default();
        ModSummary {
            name: if meta.name.is_empty() {
                None
            } else {
                Some(meta.name.clone())
            },
            dep_ids,
        }
    }

    /// Inverse of `to_annotation`: everything before the last `:` is the
    /// name, the rest splits on `,`. Text without a colon is a bare
    /// dependency list.
    pub fn of_annotation(text: &str) -> Self {
        let (name, deps) = match text.rfind(':') {
            Some(idx) => (&text[..idx], &text[idx + 1..]),
            None => ("", text),
        };
        let name = name.trim();
        ModSummary {
            name: if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            },
            dep_ids: deps.split(',').filter_map(PackageId::new).collect(),
        }
    }

    pub fn to_annotation(&self) -> String {
        let ids = self
            .dep_ids
            .iter()
            .map(PackageId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        match (&self.name, ids.is_empty()) {
            (Some(name), true) => name.clone(),
            (Some(name), false) => format!("{name}: {ids}"),
            (None, true) => String::new(),
            (None, false) => ids,
        }
    }
}

/// A load-order document: the raw text it was parsed from plus the node
/// tree. The two agree at construction; `reconcile` mutates the tree in
/// place and refreshes the raw text only when it changed.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    raw: String,
    tree: xml::Document,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Self {
        ConfigDocument {
            raw: text.to_string(),
            tree: xml::parse(text),
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw
    }

    /// Bring trailing annotations in line with `mods`. Mutates the
    /// document in place; returns the re-serialized text when at least one
    /// annotation was inserted, rewritten, or removed, `None` when the
    /// document already agreed (so callers can skip the rewrite). Running
    /// this twice against the same map is a no-op on the second pass.
    pub fn reconcile(&mut self, mods: &ModMap, diag: &mut Diagnostics) -> Option<String> {
        let Some(root) = self.tree.root_mut() else {
            diag.error(ROOT_TAG, "document has no root element");
            return None;
        };
        if !root.name.eq_ignore_ascii_case(ROOT_TAG) {
            diag.error(ROOT_TAG, format!("unexpected root <{}/>", root.name));
        }

        let active_count = root.child_elements(ACTIVE_MODS_TAG).count();
        if active_count == 0 {
            diag.error(ROOT_TAG, format!("no <{ACTIVE_MODS_TAG}/> found"));
            return None;
        }
        if active_count > 1 {
            diag.error(
                ROOT_TAG,
                format!("more than one <{ACTIVE_MODS_TAG}/> found; using the first"),
            );
        }
        let Some(active_mods) = root.children.iter_mut().find_map(|node| match node {
            Node::Element(el) if el.name == ACTIVE_MODS_TAG => Some(el),
            _ => None,
        }) else {
            return None;
        };

        let mut changed = false;
        let children = &mut active_mods.children;
        let mut index = 0;
        while index < children.len() {
            let Node::Element(li) = &children[index] else {
                index += 1;
                continue;
            };
            if li.name != "li" {
                index += 1;
                continue;
            }
            let Some(active_id) = PackageId::new(&li.text()) else {
                index += 1;
                continue;
            };
            // Unknown identifiers are left untouched; the scan simply did
            // not cover them.
            let Some(meta) = mods.get(&active_id) else {
                index += 1;
                continue;
            };
            let desired = ModSummary::of_mod(meta).to_annotation();

            match trailing_comment(children, index) {
                None => {
                    if !desired.is_empty() {
                        children.insert(index + 1, Node::Comment(desired));
                        children.insert(index + 1, Node::Text(" ".to_string()));
                        changed = true;
                    }
                }
                Some(comment_index) => {
                    if let Node::Comment(existing) = &children[comment_index] {
                        let normalized = ModSummary::of_annotation(existing).to_annotation();
                        if !normalized.eq_ignore_ascii_case(&desired) {
                            if desired.is_empty() {
                                children.remove(comment_index);
                            } else {
                                children[comment_index] = Node::Comment(desired);
                            }
                            changed = true;
                        }
                    }
                }
            }
            index += 1;
        }

        if !changed {
            return None;
        }
        let text = xml::serialize(&self.tree);
        self.raw = text.clone();
        Some(text)
    }
}

/// Index of the comment trailing the node at `index`, skipping
/// whitespace-only text; any other node ends the search.
fn trailing_comment(children: &[Node], index: usize) -> Option<usize> {
    for (offset, node) in children.iter().enumerate().skip(index + 1) {
        match node {
            Node::Text(text) if text.trim().is_empty() => continue,
            Node::Comment(_) => return Some(offset),
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ContentSource, ModDependency, ModMetaData};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn mod_meta(package_id: &str, name: &str, v14_deps: &[&str]) -> ModMetaData {
        let mut by_version = BTreeMap::new();
        if !v14_deps.is_empty() {
            by_version.insert(
                "1.4".to_string(),
                v14_deps
                    .iter()
                    .map(|id| ModDependency {
                        package_id: PackageId::new(id).unwrap(),
                        display_name: None,
                        steam_workshop_url: None,
                        download_url: None,
                    })
                    .collect(),
            );
        }
        ModMetaData {
            content_source: ContentSource::WorkshopFolder,
            package_id: package_id.to_string(),
            name: name.to_string(),
            author: None,
            description: None,
            unversioned_dependencies: None,
            dependencies_by_version: if by_version.is_empty() {
                None
            } else {
                Some(by_version)
            },
            load_after: None,
            load_before: None,
            workshop_folder_name: None,
        }
    }

    fn map_of(mods: Vec<ModMetaData>) -> ModMap {
        mods.into_iter()
            .map(|meta| (PackageId::new(&meta.package_id).unwrap(), meta))
            .collect()
    }

    #[test]
    fn annotation_formatting_covers_all_combinations() {
        let dep = |id: &str| PackageId::new(id).unwrap();
        let both = ModSummary {
            name: Some("FooMod".to_string()),
            dep_ids: vec![dep("bar"), dep("baz")],
        };
        assert_eq!(both.to_annotation(), "FooMod: bar, baz");

        let name_only = ModSummary {
            name: Some("FooMod".to_string()),
            dep_ids: vec![],
        };
        assert_eq!(name_only.to_annotation(), "FooMod");

        let deps_only = ModSummary {
            name: None,
            dep_ids: vec![dep("bar")],
        };
        assert_eq!(deps_only.to_annotation(), "bar");

        assert_eq!(ModSummary::default().to_annotation(), "");
    }

    #[test]
    fn annotation_inverse_splits_on_last_colon() {
        let parsed = ModSummary::of_annotation("FooMod: bar, baz");
        assert_eq!(parsed.name.as_deref(), Some("FooMod"));
        let ids: Vec<&str> = parsed.dep_ids.iter().map(PackageId::as_str).collect();
        assert_eq!(ids, ["bar", "baz"]);

        // No colon: a bare dependency list.
        let bare = ModSummary::of_annotation("bar, baz");
        assert_eq!(bare.name, None);
        assert_eq!(bare.dep_ids.len(), 2);

        // Names may themselves contain colons.
        let colon_name = ModSummary::of_annotation("Foo: The Sequel: bar");
        assert_eq!(colon_name.name.as_deref(), Some("Foo: The Sequel"));
    }

    #[test]
    fn inserts_comment_after_active_mod_entry() {
        let mut doc = ConfigDocument::parse(
            "<ModsConfigData><activeMods><li>Foo</li></activeMods></ModsConfigData>",
        );
        let mods = map_of(vec![mod_meta("foo", "FooMod", &["bar"])]);
        let mut diag = Diagnostics::new();
        let out = doc.reconcile(&mods, &mut diag).unwrap();
        assert_eq!(
            out,
            "<ModsConfigData><activeMods><li>Foo</li> <!--FooMod: bar--></activeMods></ModsConfigData>"
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut doc = ConfigDocument::parse(
            "<ModsConfigData>\n  <activeMods>\n    <li>foo</li>\n    <li>other.mod</li>\n  </activeMods>\n</ModsConfigData>",
        );
        let mods = map_of(vec![mod_meta("foo", "FooMod", &["bar", "baz"])]);
        let mut diag = Diagnostics::new();

        let first = doc.reconcile(&mods, &mut diag).unwrap();
        let mut second_doc = ConfigDocument::parse(&first);
        assert_eq!(second_doc.reconcile(&mods, &mut diag), None);
        assert_eq!(second_doc.raw_text(), first);
    }

    #[test]
    fn matching_comment_in_different_case_is_left_alone() {
        let mut doc = ConfigDocument::parse(
            "<ModsConfigData><activeMods><li>foo</li> <!--foomod: BAR--></activeMods></ModsConfigData>",
        );
        let mods = map_of(vec![mod_meta("foo", "FooMod", &["bar"])]);
        let mut diag = Diagnostics::new();
        assert_eq!(doc.reconcile(&mods, &mut diag), None);
    }

    #[test]
    fn stale_comment_is_rewritten() {
        let mut doc = ConfigDocument::parse(
            "<ModsConfigData><activeMods><li>foo</li> <!--OldName: old.dep--></activeMods></ModsConfigData>",
        );
        let mods = map_of(vec![mod_meta("foo", "FooMod", &["bar"])]);
        let mut diag = Diagnostics::new();
        let out = doc.reconcile(&mods, &mut diag).unwrap();
        assert!(out.contains("<!--FooMod: bar-->"));
        assert!(!out.contains("OldName"));
    }

    #[test]
    fn unknown_identifier_is_skipped_silently() {
        let mut doc = ConfigDocument::parse(
            "<ModsConfigData><activeMods><li>not.scanned</li></activeMods></ModsConfigData>",
        );
        let mods = map_of(vec![mod_meta("foo", "FooMod", &["bar"])]);
        let mut diag = Diagnostics::new();
        assert_eq!(doc.reconcile(&mods, &mut diag), None);
        assert!(diag.is_empty());
    }

    #[test]
    fn missing_active_mods_aborts_without_panicking() {
        let mut doc = ConfigDocument::parse("<ModsConfigData><version>1.4</version></ModsConfigData>");
        let mods = ModMap::new();
        let mut diag = Diagnostics::new();
        assert_eq!(doc.reconcile(&mods, &mut diag), None);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn unexpected_root_tag_is_diagnosed_but_processed() {
        let mut doc = ConfigDocument::parse(
            "<SomethingElse><activeMods><li>foo</li></activeMods></SomethingElse>",
        );
        let mods = map_of(vec![mod_meta("foo", "FooMod", &["bar"])]);
        let mut diag = Diagnostics::new();
        let out = doc.reconcile(&mods, &mut diag).unwrap();
        assert!(out.contains("<!--FooMod: bar-->"));
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn comment_for_a_dropped_dependency_list_is_removed() {
        // A nameless, dependency-free mod formats to an empty annotation,
        // so the stale comment is removed outright.
        let mut doc = ConfigDocument::parse(
            "<ModsConfigData><activeMods><li>foo</li> <!--old.dep--></activeMods></ModsConfigData>",
        );
        let mods = map_of(vec![mod_meta("foo", "", &[])]);
        let mut diag = Diagnostics::new();
        let out = doc.reconcile(&mods, &mut diag).unwrap();
        assert!(!out.contains("old.dep"));
        assert!(!out.contains("<!--"));
    }

    #[test]
    fn surrounding_document_content_is_preserved() {
        let input = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<ModsConfigData>\n  <version>1.4.3901 rev726</version>\n  <activeMods>\n    <li>ludeon.rimworld</li>\n    <li>foo</li>\n  </activeMods>\n  <knownExpansions />\n</ModsConfigData>";
        let mut doc = ConfigDocument::parse(input);
        let mods = map_of(vec![mod_meta("foo", "FooMod", &["bar"])]);
        let mut diag = Diagnostics::new();
        let out = doc.reconcile(&mods, &mut diag).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(out.contains("<version>1.4.3901 rev726</version>"));
        assert!(out.contains("<li>foo</li> <!--FooMod: bar-->"));
        assert!(out.contains("<li>ludeon.rimworld</li>\n"));
    }

    #[test]
    fn annotation_roundtrip_normalizes_dangling_colon() {
        let normalized = ModSummary::of_annotation("FooMod:").to_annotation();
        assert_eq!(normalized, "FooMod");
    }
}
