//! Editor context attached to outgoing prompts.
//!
//! The host supplies a read-only snapshot at send time; this module renders it
//! into the `<editor-context>` suffix the agent sees and into the
//! [`ContextItem`]s recorded on the user message.

use crate::model::ContextItem;

/// Selected line range and its text, 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSelection {
    pub start_line: u32,
    pub end_line: u32,
    pub text: String,
}

/// Host editor state at the moment a message is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub active_file_path: Option<String>,
    pub selection: Option<EditorSelection>,
}

impl EditorSnapshot {
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            active_file_path: Some(path.into()),
            selection: None,
        }
    }

    #[must_use]
    pub fn with_selection(
        mut self,
        start_line: u32,
        end_line: u32,
        text: impl Into<String>,
    ) -> Self {
        self.selection = Some(EditorSelection {
            start_line,
            end_line,
            text: text.into(),
        });
        self
    }

    fn file_path(&self) -> Option<&str> {
        self.active_file_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
    }

    fn non_blank_selection(&self) -> Option<&EditorSelection> {
        self.selection
            .as_ref()
            .filter(|selection| !selection.text.trim().is_empty())
    }
}

/// Host collaborator that reports the current editor state.
pub trait EditorContextSource: Send + Sync {
    fn snapshot(&self) -> EditorSnapshot;
}

/// Source for hosts without an editor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEditorContext;

impl EditorContextSource for NoEditorContext {
    fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot::default()
    }
}

/// Source that always reports the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticEditorContext {
    snapshot: EditorSnapshot,
}

impl StaticEditorContext {
    #[must_use]
    pub fn new(snapshot: EditorSnapshot) -> Self {
        Self { snapshot }
    }
}

impl EditorContextSource for StaticEditorContext {
    fn snapshot(&self) -> EditorSnapshot {
        self.snapshot.clone()
    }
}

/// Renders the `<editor-context>` block, or `None` when no file is open.
#[must_use]
pub fn format_editor_context(snapshot: &EditorSnapshot) -> Option<String> {
    let path = snapshot.file_path()?;

    let mut rendered = String::from("<editor-context>");
    rendered.push_str("<current-file>");
    rendered.push_str(path);
    rendered.push_str("</current-file>");
    if let Some(selection) = snapshot.non_blank_selection() {
        rendered.push_str(&format!(
            "<selected-text line=\"{}\">{}</selected-text>",
            line_attribute(selection.start_line, selection.end_line),
            selection.text
        ));
    }
    rendered.push_str("</editor-context>");
    Some(rendered)
}

/// Prompt text as sent to the agent: the user's text, a blank line, then the
/// editor context block when there is one.
#[must_use]
pub fn append_editor_context(prompt: &str, snapshot: &EditorSnapshot) -> String {
    match format_editor_context(snapshot) {
        Some(context) => format!("{prompt}\n\n{context}"),
        None => prompt.to_string(),
    }
}

/// Context items recorded on the user message for display.
#[must_use]
pub fn context_items(snapshot: &EditorSnapshot) -> Vec<ContextItem> {
    let Some(path) = snapshot.file_path() else {
        return Vec::new();
    };

    let mut items = vec![ContextItem::File {
        path: path.to_string(),
    }];
    if let Some(selection) = snapshot.non_blank_selection() {
        items.push(ContextItem::Selection {
            path: path.to_string(),
            start_line: selection.start_line,
            end_line: selection.end_line,
            text: selection.text.clone(),
        });
    }
    items
}

fn line_attribute(start_line: u32, end_line: u32) -> String {
    if start_line == end_line {
        start_line.to_string()
    } else {
        format!("{start_line}-{end_line}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn no_file_means_no_suffix_and_no_items() {
        let snapshot = EditorSnapshot::default();
        assert_eq!(format_editor_context(&snapshot), None);
        assert_eq!(append_editor_context("hi", &snapshot), "hi");
        assert!(context_items(&snapshot).is_empty());
        assert_eq!(NoEditorContext.snapshot(), snapshot);
    }

    #[test]
    fn file_only_context() {
        let snapshot = EditorSnapshot::file("notes/todo.md");
        assert_eq!(
            format_editor_context(&snapshot).as_deref(),
            Some("<editor-context><current-file>notes/todo.md</current-file></editor-context>")
        );
    }

    #[test]
    fn selection_renders_line_range() {
        let snapshot = EditorSnapshot::file("src/main.rs").with_selection(3, 7, "fn main() {}");
        assert_eq!(
            append_editor_context("explain", &snapshot),
            "explain\n\n<editor-context><current-file>src/main.rs</current-file>\
             <selected-text line=\"3-7\">fn main() {}</selected-text></editor-context>"
        );
    }

    #[test]
    fn single_line_selection_uses_one_number() {
        let snapshot = EditorSnapshot::file("a.md").with_selection(4, 4, "x");
        let rendered = format_editor_context(&snapshot).unwrap_or_default();
        assert!(rendered.contains("<selected-text line=\"4\">x</selected-text>"));
    }

    #[test]
    fn blank_selection_is_omitted() {
        let snapshot = EditorSnapshot::file("a.md").with_selection(1, 2, "  \n");
        let rendered = format_editor_context(&snapshot).unwrap_or_default();
        assert!(!rendered.contains("selected-text"));
        assert_eq!(context_items(&snapshot).len(), 1);
    }

    #[test]
    fn items_mirror_file_and_selection() {
        let source =
            StaticEditorContext::new(EditorSnapshot::file("a.md").with_selection(2, 3, "body"));
        assert_eq!(
            context_items(&source.snapshot()),
            vec![
                ContextItem::File {
                    path: "a.md".to_string()
                },
                ContextItem::Selection {
                    path: "a.md".to_string(),
                    start_line: 2,
                    end_line: 3,
                    text: "body".to_string(),
                },
            ]
        );
    }
}
