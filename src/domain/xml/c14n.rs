//! Canonical XML 1.0 (inclusive, without comments) over an element subtree.
//!
//! The apex element carries every namespace declaration in scope from its
//! ancestors plus inherited `xml:*` attributes, so the output is the same
//! whether the subtree is canonicalized in place or after extraction by a
//! verifier. One descendant subtree can be excluded, which is how the
//! enveloped-signature transform is applied.

use super::tree::{split_qname, Document, Element, Node};
use crate::domain::constants::XML_NAMESPACE;
use std::collections::BTreeMap;

type Scope = BTreeMap<String, String>;

/// Canonicalize the element at `path`, optionally skipping the element at
/// `exclude` (must be a descendant of `path` to have any effect).
#[must_use]
pub fn canonicalize(doc: &Document, path: &[usize], exclude: Option<&[usize]>) -> Option<String> {
    let apex = doc.element_at(path)?;

    let inherited: Scope = match path.split_last() {
        Some((_, parent)) => doc.declarations_in_scope(parent).into_iter().collect(),
        None => Scope::new(),
    };

    let mut inherited_xml_attrs: BTreeMap<String, String> = BTreeMap::new();
    for ancestor in doc.ancestors(path) {
        for attr in &ancestor.attributes {
            if attr.name.starts_with("xml:") {
                inherited_xml_attrs.insert(attr.name.clone(), attr.value.clone());
            }
        }
    }
    for attr in &apex.attributes {
        inherited_xml_attrs.remove(&attr.name);
    }

    let mut out = String::new();
    let ctx = Context {
        exclude,
        inherited_xml_attrs: &inherited_xml_attrs,
    };
    let mut current_path = path.to_vec();
    write_element(apex, &inherited, None, &ctx, &mut current_path, &mut out);
    Some(out)
}

struct Context<'a> {
    exclude: Option<&'a [usize]>,
    inherited_xml_attrs: &'a BTreeMap<String, String>,
}

fn write_element(
    element: &Element,
    parent_scope: &Scope,
    rendered_scope: Option<&Scope>,
    ctx: &Context<'_>,
    path: &mut Vec<usize>,
    out: &mut String,
) {
    let mut scope = parent_scope.clone();
    for (prefix, uri) in &element.namespaces {
        scope.insert(prefix.clone(), uri.clone());
    }

    // Namespace axis: everything for the apex, only changes below it.
    let mut ns_out: Vec<(&str, &str)> = Vec::new();
    for (prefix, uri) in &scope {
        if prefix == "xml" {
            continue;
        }
        let emit = match rendered_scope {
            None => !(prefix.is_empty() && uri.is_empty()),
            Some(parent) => {
                let before = parent.get(prefix).map_or("", String::as_str);
                before != uri && !(prefix.is_empty() && uri.is_empty() && before.is_empty())
            }
        };
        if emit {
            ns_out.push((prefix.as_str(), uri.as_str()));
        }
    }

    // Attribute axis sorted by (namespace URI, local name).
    let mut attrs: Vec<(String, &str, &str, &str)> = Vec::new();
    let apex = rendered_scope.is_none();
    for attr in &element.attributes {
        let (prefix, local) = split_qname(&attr.name);
        attrs.push((
            attribute_namespace(prefix, &scope),
            local,
            attr.name.as_str(),
            attr.value.as_str(),
        ));
    }
    if apex {
        for (name, value) in ctx.inherited_xml_attrs {
            let (_, local) = split_qname(name);
            attrs.push((
                XML_NAMESPACE.to_string(),
                local,
                name.as_str(),
                value.as_str(),
            ));
        }
    }
    attrs.sort_by(|a, b| (a.0.as_str(), a.1).cmp(&(b.0.as_str(), b.1)));

    out.push('<');
    out.push_str(&element.name);
    for (prefix, uri) in ns_out {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attribute(uri, out);
        out.push('"');
    }
    for (_, _, name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attribute(value, out);
        out.push('"');
    }
    out.push('>');

    for (idx, child) in element.children.iter().enumerate() {
        match child {
            Node::Element(e) => {
                path.push(idx);
                if ctx.exclude != Some(path.as_slice()) {
                    write_element(e, &scope, Some(&scope), ctx, path, out);
                }
                path.pop();
            }
            Node::Text(t) => escape_text(t, out),
            Node::ProcessingInstruction { target, data } => {
                out.push_str("<?");
                out.push_str(target);
                if !data.is_empty() {
                    out.push(' ');
                    out.push_str(data);
                }
                out.push_str("?>");
            }
        }
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn attribute_namespace(prefix: &str, scope: &Scope) -> String {
    match prefix {
        "" => String::new(),
        "xml" => XML_NAMESPACE.to_string(),
        p => scope.get(p).cloned().unwrap_or_default(),
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
