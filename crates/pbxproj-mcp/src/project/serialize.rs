use super::{ObjectId, PbxObject, PbxProject, PhaseKind, file_name};
use crate::plist::{Value, quote_if_needed};
use std::collections::BTreeMap;

/// Objects Xcode writes on a single line.
const SINGLE_LINE_ISAS: &[&str] = &["PBXBuildFile", "PBXFileReference"];

/// Id-valued keys Xcode leaves without a comment.
const UNANNOTATED_KEYS: &[&str] = &["remoteGlobalIDString"];

fn tabs(out: &mut String, n: usize) {
    for _ in 0..n {
        out.push('\t');
    }
}

struct Writer<'a> {
    annotations: &'a BTreeMap<ObjectId, String>,
}

impl Writer<'_> {
    /// A scalar, annotated with `/* ... */` when it names an object.
    fn scalar(&self, out: &mut String, s: &str) {
        out.push_str(&quote_if_needed(s));
        if let Some(note) = self.annotations.get(s) {
            out.push_str(" /* ");
            out.push_str(note);
            out.push_str(" */");
        }
    }

    fn value(&self, out: &mut String, value: &Value, indent: usize) {
        match value {
            Value::String(s) => self.scalar(out, s),
            Value::Array(items) => {
                out.push_str("(\n");
                for item in items {
                    tabs(out, indent + 1);
                    self.value(out, item, indent + 1);
                    out.push_str(",\n");
                }
                tabs(out, indent);
                out.push(')');
            }
            Value::Dict(map) => {
                out.push_str("{\n");
                for (k, v) in map {
                    tabs(out, indent + 1);
                    out.push_str(&quote_if_needed(k));
                    out.push_str(" = ");
                    self.value(out, v, indent + 1);
                    out.push_str(";\n");
                }
                tabs(out, indent);
                out.push('}');
            }
        }
    }

    fn inline(&self, out: &mut String, value: &Value) {
        match value {
            Value::String(s) => self.scalar(out, s),
            Value::Array(items) => {
                out.push('(');
                for item in items {
                    self.inline(out, item);
                    out.push_str(", ");
                }
                out.push(')');
            }
            Value::Dict(map) => {
                out.push('{');
                for (k, v) in map {
                    out.push_str(&quote_if_needed(k));
                    out.push_str(" = ");
                    self.inline(out, v);
                    out.push_str("; ");
                }
                out.push('}');
            }
        }
    }

    fn object(&self, out: &mut String, id: &ObjectId, obj: &PbxObject) {
        tabs(out, 2);
        self.scalar(out, id.as_str());
        out.push_str(" = {");
        if SINGLE_LINE_ISAS.contains(&obj.isa.as_str()) {
            out.push_str("isa = ");
            out.push_str(&quote_if_needed(&obj.isa));
            out.push_str("; ");
            for (k, v) in &obj.fields {
                out.push_str(&quote_if_needed(k));
                out.push_str(" = ");
                self.inline(out, v);
                out.push_str("; ");
            }
            out.push_str("};\n");
            return;
        }
        out.push('\n');
        tabs(out, 3);
        out.push_str("isa = ");
        out.push_str(&quote_if_needed(&obj.isa));
        out.push_str(";\n");
        for (k, v) in &obj.fields {
            tabs(out, 3);
            out.push_str(&quote_if_needed(k));
            out.push_str(" = ");
            match v {
                Value::String(s) if UNANNOTATED_KEYS.contains(&k.as_str()) => {
                    out.push_str(&quote_if_needed(s));
                }
                _ => self.value(out, v, 3),
            }
            out.push_str(";\n");
        }
        tabs(out, 2);
        out.push_str("};\n");
    }
}

fn phase_label(obj: &PbxObject) -> String {
    if let Some(name) = obj.str_field("name") {
        return name.to_string();
    }
    match PhaseKind::from_isa(&obj.isa) {
        Some(kind) => kind.label().to_string(),
        None if obj.isa == "PBXRezBuildPhase" => "Rez".to_string(),
        None => obj.isa.clone(),
    }
}

impl PbxProject {
    /// Serializes in Xcode's canonical layout: sections per `isa`, objects by
    /// id, `isa` first, keys sorted, references annotated with comments.
    pub fn to_pbxproj_string(&self) -> String {
        let annotations = self.annotations();
        let w = Writer {
            annotations: &annotations,
        };

        let mut out = String::from("// !$*UTF8*$!\n{\n");
        let mut keys: Vec<&str> = self.header.keys().map(String::as_str).collect();
        keys.push("objects");
        keys.sort_unstable();
        for key in keys {
            if key == "objects" {
                self.write_objects(&w, &mut out);
                continue;
            }
            tabs(&mut out, 1);
            out.push_str(&quote_if_needed(key));
            out.push_str(" = ");
            w.value(&mut out, &self.header[key], 1);
            out.push_str(";\n");
        }
        out.push_str("}\n");
        out
    }

    fn write_objects(&self, w: &Writer<'_>, out: &mut String) {
        let mut sections: BTreeMap<&str, Vec<(&ObjectId, &PbxObject)>> = BTreeMap::new();
        for (id, obj) in &self.objects {
            sections.entry(obj.isa.as_str()).or_default().push((id, obj));
        }
        out.push_str("\tobjects = {\n");
        for (isa, objects) in sections {
            out.push_str(&format!("\n/* Begin {isa} section */\n"));
            for (id, obj) in objects {
                w.object(out, id, obj);
            }
            out.push_str(&format!("/* End {isa} section */\n"));
        }
        out.push_str("\t};\n");
    }

    /// The comment Xcode writes next to each object id.
    pub fn annotations(&self) -> BTreeMap<ObjectId, String> {
        let mut phase_of: BTreeMap<ObjectId, &PbxObject> = BTreeMap::new();
        let mut list_owner: BTreeMap<ObjectId, &PbxObject> = BTreeMap::new();
        for obj in self.objects.values() {
            if obj.is_build_phase() {
                for f in obj.id_list("files") {
                    phase_of.entry(f).or_insert(obj);
                }
            }
            if let Some(list) = obj.id_field("buildConfigurationList") {
                list_owner.entry(list).or_insert(obj);
            }
        }

        let mut out = BTreeMap::new();
        for (id, obj) in &self.objects {
            let note = match obj.isa.as_str() {
                "PBXBuildFile" => {
                    let file = obj
                        .id_field("fileRef")
                        .and_then(|r| self.display_name(&r))
                        .or_else(|| {
                            obj.id_field("productRef")
                                .and_then(|r| self.objects.get(&r))
                                .and_then(|p| p.str_field("productName"))
                                .map(str::to_string)
                        })
                        .unwrap_or_else(|| "(null)".to_string());
                    match phase_of.get(id) {
                        Some(phase) => Some(format!("{file} in {}", phase_label(phase))),
                        None => Some(file),
                    }
                }
                "PBXProject" => Some("Project object".to_string()),
                "XCConfigurationList" => list_owner.get(id).map(|owner| {
                    let owner_name = if owner.isa == "PBXProject" {
                        self.name.clone()
                    } else {
                        owner.str_field("name").unwrap_or_default().to_string()
                    };
                    format!("Build configuration list for {} \"{owner_name}\"", owner.isa)
                }),
                "XCSwiftPackageProductDependency" => {
                    obj.str_field("productName").map(str::to_string)
                }
                "XCRemoteSwiftPackageReference" => obj.str_field("repositoryURL").map(|url| {
                    let repo = file_name(url.trim_end_matches('/'));
                    let repo = repo.strip_suffix(".git").unwrap_or(repo);
                    format!("XCRemoteSwiftPackageReference \"{repo}\"")
                }),
                "XCLocalSwiftPackageReference" => obj
                    .str_field("relativePath")
                    .map(|p| format!("XCLocalSwiftPackageReference \"{p}\"")),
                "PBXTargetDependency" | "PBXContainerItemProxy" | "PBXBuildRule" => {
                    Some(obj.isa.clone())
                }
                _ if obj.is_build_phase() => Some(phase_label(obj)),
                _ => self.display_name(id),
            };
            if let Some(note) = note {
                out.insert(id.clone(), note);
            }
        }
        out
    }
}
