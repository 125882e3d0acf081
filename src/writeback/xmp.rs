//! XMP sidecar writeback module
//!
//! Claims images, audio and video. Writes the edited properties as an XMP
//! packet into a `.xmp` sidecar next to the target file.

use std::path::Path;
use std::sync::Arc;

use crate::storage::MetadataStore;
use crate::writeback::file::{FileWriteback, FileWritebackHost};
use crate::writeback::module::WritebackModuleDesc;
use crate::writeback::{Cancellation, WritebackRows};

pub fn module() -> WritebackModuleDesc {
    WritebackModuleDesc {
        name: "xmp",
        rdf_types: &["nfo:Image", "nfo:Audio", "nfo:Video"],
        content_types: &[
            "image/png",  /* .png files */
            "sketch/png", /* .sketch.png files */
            "image/jpeg", /* .jpg & .jpeg files */
            "image/tiff", /* .tiff & .tif files */
        ],
        create: Arc::new(|| Box::new(FileWritebackHost::new(XmpWriteback))),
    }
}

struct XmpWriteback;

/// Map an edited predicate to its XMP property
fn xmp_property(predicate: &str) -> Option<&'static str> {
    match predicate {
        "nie:title" => Some("dc:title"),
        "nie:description" => Some("dc:description"),
        "nco:creator" | "nco:publisher" => Some("dc:creator"),
        "nie:contentCreated" => Some("xmp:CreateDate"),
        "nao:hasTag" => Some("dc:subject"),
        _ => None,
    }
}

impl FileWriteback for XmpWriteback {
    fn write_file_metadata(
        &mut self,
        path: &Path,
        rows: &WritebackRows,
        _store: &MetadataStore,
        cancellation: &Cancellation,
    ) -> bool {
        let mut properties = Vec::new();
        for row in rows {
            if let [_, predicate, value, ..] = row.as_slice() {
                if let Some(name) = xmp_property(predicate) {
                    properties.push((name, value.as_str()));
                }
            }
        }

        if properties.is_empty() {
            tracing::debug!("no XMP-mappable properties for {}", path.display());
            return true;
        }

        if cancellation.is_cancelled() {
            return false;
        }

        let mut packet = String::from(
            "<?xpacket begin=\"\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n\
             <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n\
             <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n\
             <rdf:Description rdf:about=\"\"\n\
             \txmlns:dc=\"http://purl.org/dc/elements/1.1/\"\n\
             \txmlns:xmp=\"http://ns.adobe.com/xap/1.0/\">\n",
        );
        for (name, value) in &properties {
            packet.push_str(&format!("<{name}>{}</{name}>\n", escape_xml(value)));
        }
        packet.push_str("</rdf:Description>\n</rdf:RDF>\n</x:xmpmeta>\n<?xpacket end=\"w\"?>\n");

        if cancellation.is_cancelled() {
            return false;
        }

        let sidecar = sidecar_path(path);
        match std::fs::write(&sidecar, packet) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to write {}: {e}", sidecar.display());
                false
            }
        }
    }
}

fn sidecar_path(path: &Path) -> std::path::PathBuf {
    let mut os_string = path.as_os_str().to_os_string();
    os_string.push(".xmp");
    os_string.into()
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
