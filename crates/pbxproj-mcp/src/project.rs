use crate::plist::{self, ParseError, Value};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

mod errors;
mod paths;
mod serialize;

pub use errors::ProjectError;
pub use paths::{ParentMap, file_name, normalize_path, parent_dir, strip_dir_prefix};

pub const GROUP_ISAS: &[&str] = &["PBXGroup", "PBXVariantGroup", "XCVersionGroup"];
pub const TARGET_ISAS: &[&str] = &["PBXNativeTarget", "PBXAggregateTarget", "PBXLegacyTarget"];

/// Keys whose list entries are object ids.
pub const REFERENCE_LIST_KEYS: &[&str] = &[
    "buildConfigurations",
    "buildPhases",
    "buildRules",
    "children",
    "dependencies",
    "files",
    "packageProductDependencies",
    "packageReferences",
    "targets",
];

/// Keys holding a single object id.
pub const REFERENCE_KEYS: &[&str] = &[
    "baseConfigurationReference",
    "buildConfigurationList",
    "containerPortal",
    "currentVersion",
    "fileRef",
    "mainGroup",
    "productRef",
    "productRefGroup",
    "productReference",
    "remoteRef",
    "target",
    "targetProxy",
];

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Xcode writes 24 upper-case hex digits; anything else came from a hand edit.
    pub fn is_canonical(&self) -> bool {
        self.0.len() == 24
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
    }
}

impl Borrow<str> for ObjectId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Sources,
    Resources,
    Frameworks,
    Headers,
    CopyFiles,
    ShellScript,
}

impl PhaseKind {
    pub fn isa(self) -> &'static str {
        match self {
            PhaseKind::Sources => "PBXSourcesBuildPhase",
            PhaseKind::Resources => "PBXResourcesBuildPhase",
            PhaseKind::Frameworks => "PBXFrameworksBuildPhase",
            PhaseKind::Headers => "PBXHeadersBuildPhase",
            PhaseKind::CopyFiles => "PBXCopyFilesBuildPhase",
            PhaseKind::ShellScript => "PBXShellScriptBuildPhase",
        }
    }

    pub fn from_isa(isa: &str) -> Option<Self> {
        match isa {
            "PBXSourcesBuildPhase" => Some(PhaseKind::Sources),
            "PBXResourcesBuildPhase" => Some(PhaseKind::Resources),
            "PBXFrameworksBuildPhase" => Some(PhaseKind::Frameworks),
            "PBXHeadersBuildPhase" => Some(PhaseKind::Headers),
            "PBXCopyFilesBuildPhase" => Some(PhaseKind::CopyFiles),
            "PBXShellScriptBuildPhase" => Some(PhaseKind::ShellScript),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PhaseKind::Sources => "Sources",
            PhaseKind::Resources => "Resources",
            PhaseKind::Frameworks => "Frameworks",
            PhaseKind::Headers => "Headers",
            PhaseKind::CopyFiles => "CopyFiles",
            PhaseKind::ShellScript => "ShellScript",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sources" => Some(PhaseKind::Sources),
            "resources" => Some(PhaseKind::Resources),
            "frameworks" => Some(PhaseKind::Frameworks),
            "headers" => Some(PhaseKind::Headers),
            "copy_files" | "copyfiles" => Some(PhaseKind::CopyFiles),
            "shell_script" | "shellscript" => Some(PhaseKind::ShellScript),
            _ => None,
        }
    }
}

pub fn is_build_phase_isa(isa: &str) -> bool {
    PhaseKind::from_isa(isa).is_some() || isa == "PBXRezBuildPhase"
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbxObject {
    pub isa: String,
    pub fields: BTreeMap<String, Value>,
}

impl PbxObject {
    pub fn new(isa: impl Into<String>) -> Self {
        Self {
            isa: isa.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn with_list(mut self, key: &str, ids: Vec<ObjectId>) -> Self {
        self.fields.insert(
            key.to_string(),
            Value::Array(ids.into_iter().map(|id| Value::String(id.0)).collect()),
        );
        self
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn id_field(&self, key: &str) -> Option<ObjectId> {
        self.str_field(key).map(ObjectId::new)
    }

    pub fn id_list(&self, key: &str) -> Vec<ObjectId> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ObjectId::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_list(&mut self, key: &str, ids: &[ObjectId]) {
        self.fields.insert(
            key.to_string(),
            Value::Array(ids.iter().map(|id| Value::from(id.as_str())).collect()),
        );
    }

    pub fn set_str(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .insert(key.to_string(), Value::String(value.into()));
    }

    /// The array stored under `key`, created empty when absent or not an array.
    pub fn list_mut(&mut self, key: &str) -> &mut Vec<Value> {
        let slot = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(vec![]));
        if !matches!(slot, Value::Array(_)) {
            *slot = Value::Array(vec![]);
        }
        match slot {
            Value::Array(items) => items,
            _ => unreachable!("slot was just normalized to an array"),
        }
    }

    /// Every (key, id) this object points at through a reference key.
    pub fn outgoing(&self) -> Vec<(&str, ObjectId)> {
        let mut out = vec![];
        for (key, value) in &self.fields {
            if REFERENCE_KEYS.contains(&key.as_str()) {
                if let Some(id) = value.as_str() {
                    out.push((key.as_str(), ObjectId::new(id)));
                }
            } else if REFERENCE_LIST_KEYS.contains(&key.as_str()) {
                for id in self.id_list(key) {
                    out.push((key.as_str(), id));
                }
            }
        }
        out
    }

    pub fn is_group(&self) -> bool {
        GROUP_ISAS.contains(&self.isa.as_str())
    }

    pub fn is_target(&self) -> bool {
        TARGET_ISAS.contains(&self.isa.as_str())
    }

    pub fn is_file_reference(&self) -> bool {
        self.isa == "PBXFileReference"
    }

    pub fn is_build_file(&self) -> bool {
        self.isa == "PBXBuildFile"
    }

    pub fn is_build_phase(&self) -> bool {
        is_build_phase_isa(&self.isa)
    }
}

#[derive(Debug, Clone)]
pub struct PbxProject {
    /// `.xcodeproj` stem; Xcode uses it when annotating the project's configuration list.
    pub name: String,
    /// Top-level keys except `objects`.
    pub header: BTreeMap<String, Value>,
    pub objects: BTreeMap<ObjectId, PbxObject>,
}

/// `App.xcodeproj/project.pbxproj` → `App`.
pub fn project_name_from_path(path: &Path) -> String {
    path.parent()
        .filter(|p| p.extension().is_some_and(|e| e == "xcodeproj"))
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Project".to_string())
}

impl PbxProject {
    pub fn parse(text: &str, name: impl Into<String>) -> Result<Self, ProjectError> {
        let root = plist::parse(text)?;
        let mut header = root.into_dict().ok_or(ProjectError::RootNotDict)?;
        let raw_objects = header
            .remove("objects")
            .ok_or(ProjectError::MissingObjects)?
            .into_dict()
            .ok_or(ProjectError::MissingObjects)?;

        let mut objects = BTreeMap::new();
        for (id, value) in raw_objects {
            let mut fields = value
                .into_dict()
                .ok_or_else(|| ProjectError::ObjectNotDict { id: id.clone() })?;
            let isa = match fields.remove("isa") {
                Some(Value::String(isa)) => isa,
                _ => return Err(ProjectError::MissingIsa { id }),
            };
            objects.insert(ObjectId(id), PbxObject { isa, fields });
        }

        Ok(Self {
            name: name.into(),
            header,
            objects,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, project_name_from_path(path))
            .map_err(|e| e.with_path(path.to_path_buf()))
    }

    pub fn get(&self, id: &ObjectId) -> Option<&PbxObject> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn root_object(&self) -> Option<ObjectId> {
        self.header
            .get("rootObject")
            .and_then(Value::as_str)
            .map(ObjectId::new)
            .filter(|id| self.objects.get(id).is_some_and(|o| o.isa == "PBXProject"))
    }

    fn project_object(&self) -> Option<&PbxObject> {
        self.root_object().and_then(|id| self.objects.get(&id))
    }

    pub fn main_group(&self) -> Option<ObjectId> {
        self.project_object()
            .and_then(|p| p.id_field("mainGroup"))
            .filter(|id| self.objects.contains_key(id))
    }

    pub fn products_group(&self) -> Option<ObjectId> {
        self.project_object()
            .and_then(|p| p.id_field("productRefGroup"))
    }

    /// Targets in the order the project lists them.
    pub fn targets(&self) -> Vec<(ObjectId, String)> {
        self.project_object()
            .map(|p| p.id_list("targets"))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| {
                let name = self.objects.get(&id)?.str_field("name")?.to_string();
                Some((id, name))
            })
            .collect()
    }

    pub fn target_by_name(&self, name: &str) -> Option<ObjectId> {
        self.targets()
            .into_iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| id)
    }

    pub fn phases(&self, target: &ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(target)
            .map(|t| t.id_list("buildPhases"))
            .unwrap_or_default()
    }

    pub fn phase_of_kind(&self, target: &ObjectId, kind: PhaseKind) -> Option<ObjectId> {
        self.phases_of_kind(target, kind).into_iter().next()
    }

    /// Every phase of `kind` the target lists, in build order.
    pub fn phases_of_kind(&self, target: &ObjectId, kind: PhaseKind) -> Vec<ObjectId> {
        self.phases(target)
            .into_iter()
            .filter(|p| self.objects.get(p).is_some_and(|o| o.isa == kind.isa()))
            .collect()
    }

    pub fn children(&self, group: &ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(group)
            .map(|g| g.id_list("children"))
            .unwrap_or_default()
    }

    pub fn phase_files(&self, phase: &ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(phase)
            .map(|p| p.id_list("files"))
            .unwrap_or_default()
    }

    pub fn build_file_ref(&self, build_file: &ObjectId) -> Option<ObjectId> {
        self.objects.get(build_file)?.id_field("fileRef")
    }

    /// What the navigator shows: `name`, falling back to `path`.
    pub fn display_name(&self, id: &ObjectId) -> Option<String> {
        let obj = self.objects.get(id)?;
        obj.str_field("name")
            .or_else(|| obj.str_field("path"))
            .map(str::to_string)
    }

    /// Build phases that list `build_file`.
    pub fn phases_listing(&self, build_file: &ObjectId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| o.is_build_phase())
            .filter(|(_, o)| o.id_list("files").contains(build_file))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn build_files_of(&self, file_ref: &ObjectId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| o.is_build_file())
            .filter(|(_, o)| o.str_field("fileRef") == Some(file_ref.as_str()))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Every (owner, key) whose value, or one of whose list entries, is `id`.
    pub fn references_to(&self, id: &ObjectId) -> Vec<(ObjectId, String)> {
        let mut out = vec![];
        for (owner, obj) in &self.objects {
            for (key, value) in &obj.fields {
                if value.strings().contains(&id.as_str()) {
                    out.push((owner.clone(), key.clone()));
                }
            }
        }
        if self.header.get("rootObject").and_then(Value::as_str) == Some(id.as_str()) {
            out.push((ObjectId::new(""), "rootObject".to_string()));
        }
        out
    }

    /// A fresh 24-digit identifier that collides with nothing in the project.
    pub fn generate_id(&self) -> ObjectId {
        loop {
            let raw = uuid::Uuid::new_v4().simple().to_string().to_ascii_uppercase();
            let id = ObjectId(raw[..24].to_string());
            if !self.objects.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn insert(&mut self, obj: PbxObject) -> ObjectId {
        let id = self.generate_id();
        self.objects.insert(id.clone(), obj);
        id
    }

    /// Depth-first group order from the main group; the order the navigator shows.
    pub fn tree_order(&self) -> Vec<ObjectId> {
        let mut out = vec![];
        let mut seen = BTreeSet::new();
        if let Some(main) = self.main_group() {
            self.walk(&main, &mut seen, &mut out);
        }
        out
    }

    fn walk(&self, id: &ObjectId, seen: &mut BTreeSet<ObjectId>, out: &mut Vec<ObjectId>) {
        if !seen.insert(id.clone()) {
            return;
        }
        out.push(id.clone());
        for child in self.children(id) {
            self.walk(&child, seen, out);
        }
    }

    /// Project-relative `INFOPLIST_FILE` values across the target's configurations.
    pub fn info_plist_files(&self, target: &ObjectId) -> BTreeSet<String> {
        let Some(list) = self.objects.get(target).and_then(|t| t.id_field("buildConfigurationList"))
        else {
            return BTreeSet::new();
        };
        self.objects
            .get(&list)
            .map(|l| l.id_list("buildConfigurations"))
            .unwrap_or_default()
            .iter()
            .filter_map(|c| {
                self.objects
                    .get(c)?
                    .fields
                    .get("buildSettings")?
                    .as_dict()?
                    .get("INFOPLIST_FILE")?
                    .as_str()
            })
            .map(|raw| {
                let raw = ["$(SRCROOT)/", "${SRCROOT}/", "$(PROJECT_DIR)/", "${PROJECT_DIR}/"]
                    .iter()
                    .find_map(|prefix| raw.strip_prefix(prefix))
                    .unwrap_or(raw);
                normalize_path(raw)
            })
            .collect()
    }

    /// Directory holding the `.xcodeproj`, given the `project.pbxproj` path.
    pub fn project_root(pbxproj: &Path) -> PathBuf {
        pbxproj
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
pub(crate) mod fixtures;
#[cfg(test)]
mod tests;
