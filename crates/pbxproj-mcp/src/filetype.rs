use crate::api::PhaseArg;
use crate::project::{PhaseKind, file_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileTypeOverride {
    pub last_known_file_type: Option<String>,
    pub phase: Option<PhaseArg>,
}

fn extension(path: &str) -> Option<String> {
    file_name(path)
        .rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

fn builtin_type(ext: &str) -> &'static str {
    match ext {
        "swift" => "sourcecode.swift",
        "m" => "sourcecode.c.objc",
        "mm" => "sourcecode.cpp.objcpp",
        "c" => "sourcecode.c.c",
        "cpp" | "cc" | "cxx" => "sourcecode.cpp.cpp",
        "h" => "sourcecode.c.h",
        "hpp" => "sourcecode.cpp.h",
        "metal" => "sourcecode.metal",
        "plist" => "text.plist.xml",
        "entitlements" => "text.plist.entitlements",
        "xcconfig" => "text.xcconfig",
        "xcprivacy" => "text.xml",
        "strings" => "text.plist.strings",
        "stringsdict" => "text.plist.stringsdict",
        "xcstrings" => "text.json.xcstrings",
        "json" => "text.json",
        "md" => "net.daringfireball.markdown",
        "txt" => "text",
        "html" => "text.html",
        "storyboard" => "file.storyboard",
        "xib" => "file.xib",
        "xcassets" => "folder.assetcatalog",
        "xcdatamodeld" => "wrapper.xcdatamodel",
        "png" => "image.png",
        "jpg" | "jpeg" => "image.jpeg",
        "gif" => "image.gif",
        "pdf" => "image.pdf",
        "svg" => "text.svg",
        "ttf" | "otf" => "file",
        "mp3" => "audio.mp3",
        "wav" => "audio.wav",
        "mov" => "video.quicktime",
        "mp4" => "video.mp4",
        "framework" => "wrapper.framework",
        "xcframework" => "wrapper.xcframework",
        "a" => "archive.ar",
        "dylib" => "compiled.mach-o.dylib",
        "tbd" => "sourcecode.text-based-dylib-definition",
        "bundle" => "wrapper.plug-in",
        "sh" => "text.script.sh",
        "py" => "text.script.python",
        _ => "text",
    }
}

fn builtin_phase(path: &str, ext: &str) -> Option<PhaseKind> {
    match ext {
        "swift" | "m" | "mm" | "c" | "cpp" | "cc" | "cxx" | "metal" | "xcdatamodeld" => {
            Some(PhaseKind::Sources)
        }
        "framework" | "xcframework" | "a" | "dylib" | "tbd" => Some(PhaseKind::Frameworks),
        // Info.plist is consumed through INFOPLIST_FILE, never copied.
        "plist" if file_name(path).eq_ignore_ascii_case("Info.plist") => None,
        "xcassets" | "storyboard" | "xib" | "json" | "strings" | "stringsdict" | "xcstrings"
        | "plist" | "xcprivacy" | "png" | "jpg" | "jpeg" | "gif" | "pdf" | "svg" | "ttf"
        | "otf" | "mp3" | "wav" | "mov" | "mp4" | "html" | "bundle" => Some(PhaseKind::Resources),
        _ => None,
    }
}

/// Extension table with per-extension overrides from `pbxproj.toml`.
#[derive(Debug, Clone, Default)]
pub struct FileTypes {
    overrides: BTreeMap<String, FileTypeOverride>,
}

impl FileTypes {
    pub fn new(overrides: BTreeMap<String, FileTypeOverride>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(ext, o)| (ext.trim_start_matches('.').to_ascii_lowercase(), o))
            .collect();
        Self { overrides }
    }

    pub fn last_known_file_type(&self, path: &str) -> String {
        let Some(ext) = extension(path) else {
            return "text".to_string();
        };
        self.overrides
            .get(&ext)
            .and_then(|o| o.last_known_file_type.clone())
            .unwrap_or_else(|| builtin_type(&ext).to_string())
    }

    /// Phase a file belongs to when nobody says otherwise.
    pub fn default_phase(&self, path: &str) -> Option<PhaseKind> {
        let ext = extension(path)?;
        match self.overrides.get(&ext).and_then(|o| o.phase) {
            None | Some(PhaseArg::Auto) => builtin_phase(path, &ext),
            Some(phase) => phase.kind(),
        }
    }

    /// The phase an edit should use: explicit choice, else the type default.
    pub fn resolve_phase(&self, arg: PhaseArg, path: &str) -> Option<PhaseKind> {
        match arg {
            PhaseArg::Auto => self.default_phase(path),
            other => other.kind(),
        }
    }
}
