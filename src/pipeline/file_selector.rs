/// Path selection for the batch window
///
/// Paths typed or restored by the user are accepted when they exist;
/// otherwise the user is asked through an interactive chooser. The chooser
/// sits behind the [`Chooser`] trait so the GUI can plug in native dialogs
/// and tests can script the answers.

use std::path::PathBuf;

use crate::error::{BatchError, BatchResult};

/// Interactive file / folder chooser. `None` or an empty list means the
/// user cancelled.
pub trait Chooser {
    fn pick_file(&mut self, title: &str) -> Option<PathBuf>;
    fn pick_folder(&mut self, title: &str) -> Option<PathBuf>;
    /// Pick any number of files with the given extension (without dot)
    fn pick_files(&mut self, title: &str, extension: &str) -> Vec<PathBuf>;
}

/// What `resolve_single` asks the chooser for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectKind {
    File,
    Folder,
}

/// Input accepted by [`FileSelector::resolve_multiple`]: a single path as
/// text, or a list of paths
#[derive(Debug, Clone, PartialEq)]
pub enum PathInput {
    Text(String),
    List(Vec<PathBuf>),
}

impl PathInput {
    /// Normalise to a list. Empty text is an empty list.
    pub fn into_list(self) -> Vec<PathBuf> {
        match self {
            PathInput::Text(s) if s.is_empty() => Vec::new(),
            PathInput::Text(s) => vec![PathBuf::from(s)],
            PathInput::List(list) => list,
        }
    }
}

impl From<&str> for PathInput {
    fn from(s: &str) -> Self {
        PathInput::Text(s.to_string())
    }
}

impl From<String> for PathInput {
    fn from(s: String) -> Self {
        PathInput::Text(s)
    }
}

impl From<Vec<PathBuf>> for PathInput {
    fn from(list: Vec<PathBuf>) -> Self {
        PathInput::List(list)
    }
}

/// Paths coming from JSON (saved batch presets): a string or an array of
/// strings. Anything else is rejected.
impl TryFrom<&serde_json::Value> for PathInput {
    type Error = BatchError;

    fn try_from(value: &serde_json::Value) -> BatchResult<Self> {
        match value {
            serde_json::Value::String(s) => Ok(PathInput::Text(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(PathBuf::from).ok_or_else(|| {
                        BatchError::InvalidArgument(format!(
                            "expected a path string in the list, got {}",
                            item
                        ))
                    })
                })
                .collect::<BatchResult<Vec<_>>>()
                .map(PathInput::List),
            other => Err(BatchError::InvalidArgument(format!(
                "expected a path or a list of paths, got {}",
                other
            ))),
        }
    }
}

pub struct FileSelector<C: Chooser> {
    chooser: C,
}

impl<C: Chooser> FileSelector<C> {
    pub fn new(chooser: C) -> Self {
        Self { chooser }
    }

    #[cfg(test)]
    pub fn chooser(&self) -> &C {
        &self.chooser
    }

    /// Resolve one file or folder.
    ///
    /// An empty hint opens the chooser, an existing hint is returned as-is,
    /// and a hint that does not exist is reported and replaced by a chooser
    /// pick. `None` means no selection was made.
    pub fn resolve_single(&mut self, prompt: &str, kind: SelectKind, hint: &str) -> Option<PathBuf> {
        if !hint.is_empty() {
            let path = PathBuf::from(hint);
            if path.exists() {
                return Some(path);
            }
            log::warn!("{}", BatchError::PathNotFound(path));
        }
        let picked = match kind {
            SelectKind::File => self.chooser.pick_file(prompt),
            SelectKind::Folder => self.chooser.pick_folder(prompt),
        };
        if picked.is_none() {
            log::info!("{}: selection cancelled", prompt);
        }
        picked
    }

    /// Resolve a list of files. A non-empty input is returned unchanged,
    /// without checking that the files exist; an empty input opens the
    /// multi-file chooser filtered on `extension`.
    pub fn resolve_multiple(&mut self, prompt: &str, extension: &str, input: PathInput) -> Vec<PathBuf> {
        let list = input.into_list();
        if !list.is_empty() {
            for missing in list.iter().filter(|p| !p.exists()) {
                log::debug!("{}: {} accepted without existence check", prompt, missing.display());
            }
            return list;
        }
        let picked = self.chooser.pick_files(prompt, extension);
        log::info!("{}: {} file(s) selected", prompt, picked.len());
        picked
    }

    /// [`resolve_multiple`](Self::resolve_multiple) for JSON input, rejecting
    /// values that are neither a string nor a list
    pub fn resolve_multiple_json(
        &mut self,
        prompt: &str,
        extension: &str,
        value: &serde_json::Value,
    ) -> BatchResult<Vec<PathBuf>> {
        let input = PathInput::try_from(value)?;
        Ok(self.resolve_multiple(prompt, extension, input))
    }
}

/// Chooser that replays scripted answers and records every call
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedChooser {
    pub single: Option<PathBuf>,
    pub multiple: Vec<PathBuf>,
    pub calls: Vec<String>,
}

#[cfg(test)]
impl Chooser for ScriptedChooser {
    fn pick_file(&mut self, title: &str) -> Option<PathBuf> {
        self.calls.push(format!("file:{}", title));
        self.single.clone()
    }

    fn pick_folder(&mut self, title: &str) -> Option<PathBuf> {
        self.calls.push(format!("folder:{}", title));
        self.single.clone()
    }

    fn pick_files(&mut self, title: &str, extension: &str) -> Vec<PathBuf> {
        self.calls.push(format!("files:{}:{}", title, extension));
        self.multiple.clone()
    }
}
