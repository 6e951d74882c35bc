//! Rewrites published XSD pattern facets into the regex dialect libxml2
//! accepts: `\d` becomes `[0-9]`, and `^`/`$` anchors are dropped since XSD
//! patterns are implicitly anchored.

use crate::infra::error::NfseResult;
use std::fs;
use std::path::Path;

/// Result of patching one schema text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdPatch {
    pub content: String,
    pub digit_classes_replaced: bool,
    pub anchors_removed: bool,
}

impl XsdPatch {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.digit_classes_replaced || self.anchors_removed
    }
}

#[must_use]
pub fn patch_xsd(content: &str) -> XsdPatch {
    let digit_classes_replaced = content.contains("\\d");
    let mut patched = if digit_classes_replaced {
        content.replace("\\d", "[0-9]")
    } else {
        content.to_string()
    };

    let before = patched.len();
    patched = patched.replace("value=\"^", "value=\"").replace("$\"", "\"");
    let anchors_removed = patched.len() != before;

    XsdPatch {
        content: patched,
        digit_classes_replaced,
        anchors_removed,
    }
}

/// Patch `path` in place. Returns whether the file was rewritten.
pub fn patch_xsd_file(path: &Path) -> NfseResult<bool> {
    let original = fs::read_to_string(path)?;
    let patch = patch_xsd(&original);
    if patch.changed() {
        fs::write(path, &patch.content)?;
        log::info!("Patched {}", path.display());
    } else {
        log::info!("{} already compatible", path.display());
    }
    Ok(patch.changed())
}
