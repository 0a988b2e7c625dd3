use crate::plist::ParseError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("failed to read project file: {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("project file is not a valid property list: {0}")]
    Parse(#[from] ParseError),
    #[error("project file is not a valid property list: {path}: {source}")]
    ParseAt { path: PathBuf, source: ParseError },
    #[error("project file root is not a dictionary")]
    RootNotDict,
    #[error("project file has no `objects` dictionary")]
    MissingObjects,
    #[error("object {id} is not a dictionary")]
    ObjectNotDict { id: String },
    #[error("object {id} has no `isa`")]
    MissingIsa { id: String },
}

impl ProjectError {
    pub fn code(&self) -> &'static str {
        match self {
            ProjectError::Read { .. } => "project.read_failed",
            ProjectError::Parse(_) | ProjectError::ParseAt { .. } => "project.parse_failed",
            ProjectError::RootNotDict => "project.root_not_dict",
            ProjectError::MissingObjects => "project.missing_objects",
            ProjectError::ObjectNotDict { .. } => "project.object_not_dict",
            ProjectError::MissingIsa { .. } => "project.missing_isa",
        }
    }

    pub(crate) fn with_path(self, path: PathBuf) -> Self {
        match self {
            ProjectError::Parse(source) => ProjectError::ParseAt { path, source },
            other => other,
        }
    }
}
