//! A small page to type into from the command line.

use clap::ValueEnum;

use crate::dom::{lock_document, shared, Document, DomError, NodeId, SharedDocument};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DemoTarget {
    Input,
    Textarea,
    Contenteditable,
    /// App host whose shadow tree holds a decoy editable before a
    /// `prosemirror-editor` component.
    ShadowEditor,
    /// A focused button; only force type can reach it.
    None,
}

pub struct DemoPage {
    doc: SharedDocument,
    receiver: NodeId,
}

impl DemoPage {
    pub fn build(target: DemoTarget) -> Result<Self, DomError> {
        let mut doc = Document::new();
        let body = doc.create_element("body");
        let root = doc.root();
        doc.append_child(root, body)?;

        let heading = doc.create_element("h1");
        doc.set_text_content(heading, "Demo Typer");
        doc.append_child(body, heading)?;

        let receiver = match target {
            DemoTarget::Input => {
                let input = doc.create_element("input");
                doc.set_attribute(input, "type", "text");
                doc.set_attribute(input, "id", "demo-input");
                doc.append_child(body, input)?;
                doc.focus(input);
                input
            }
            DemoTarget::Textarea => {
                let area = doc.create_element("textarea");
                doc.set_attribute(area, "id", "demo-textarea");
                doc.append_child(body, area)?;
                doc.focus(area);
                area
            }
            DemoTarget::Contenteditable => {
                let editable = doc.create_element("div");
                doc.set_attribute(editable, "contenteditable", "true");
                doc.set_attribute(editable, "id", "demo-editable");
                doc.append_child(body, editable)?;
                doc.focus(editable);
                editable
            }
            DemoTarget::ShadowEditor => {
                let app = doc.create_element("demo-app");
                doc.append_child(body, app)?;
                let app_shadow = doc.attach_shadow(app)?;

                let decoy = doc.create_element("div");
                doc.set_attribute(decoy, "contenteditable", "true");
                doc.set_attribute(decoy, "class", "comment-box");
                doc.append_child(app_shadow, decoy)?;

                let editor = doc.create_element("prosemirror-editor");
                doc.append_child(app_shadow, editor)?;
                let editor_shadow = doc.attach_shadow(editor)?;
                let content = doc.create_element("div");
                doc.set_attribute(content, "contenteditable", "true");
                doc.set_attribute(content, "class", "ProseMirror");
                doc.append_child(editor_shadow, content)?;

                doc.focus(app);
                content
            }
            DemoTarget::None => {
                let button = doc.create_element("button");
                doc.set_attribute(button, "id", "demo-button");
                doc.append_child(body, button)?;
                doc.focus(button);
                button
            }
        };

        Ok(Self {
            doc: shared(doc),
            receiver,
        })
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    /// The node whose content a successful run changes.
    pub fn receiver(&self) -> NodeId {
        self.receiver
    }

    pub fn content(&self) -> String {
        let doc = lock_document(&self.doc);
        match doc.field(self.receiver) {
            Some(field) => field.value.clone(),
            None => doc.text_content(self.receiver).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{resolve_target, EditKind, TargetSource};

    fn resolve(page: &DemoPage, force: bool) -> Option<(NodeId, EditKind, TargetSource)> {
        let doc = lock_document(page.document());
        resolve_target(&*doc, doc.active_element(), None, force)
            .ok()
            .map(|t| (t.node, t.kind, t.source))
    }

    #[test]
    fn each_target_resolves_to_its_receiver() {
        for (target, kind) in [
            (DemoTarget::Input, EditKind::PlainInput),
            (DemoTarget::Textarea, EditKind::TextArea),
            (DemoTarget::Contenteditable, EditKind::ContentEditable),
            (DemoTarget::ShadowEditor, EditKind::ContentEditable),
        ] {
            let page = DemoPage::build(target).unwrap();
            let (node, resolved_kind, _) = resolve(&page, false).unwrap();
            assert_eq!(node, page.receiver(), "{target}");
            assert_eq!(resolved_kind, kind, "{target}");
        }
    }

    #[test]
    fn shadow_editor_skips_the_decoy() {
        let page = DemoPage::build(DemoTarget::ShadowEditor).unwrap();
        let (node, _, source) = resolve(&page, false).unwrap();
        assert_eq!(source, TargetSource::ShadowTree);
        let doc = lock_document(page.document());
        assert_eq!(doc.attribute(node, "class"), Some("ProseMirror"));
    }

    #[test]
    fn button_needs_force_type() {
        let page = DemoPage::build(DemoTarget::None).unwrap();
        assert_eq!(resolve(&page, false), None);
        let (_, kind, _) = resolve(&page, true).unwrap();
        assert_eq!(kind, EditKind::Opaque);
        assert_eq!(page.content(), "");
    }

    #[test]
    fn target_names_match_cli_values() {
        assert_eq!(DemoTarget::ShadowEditor.to_string(), "shadow-editor");
        assert_eq!(DemoTarget::Contenteditable.to_string(), "contenteditable");
    }
}
