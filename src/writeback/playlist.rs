//! Playlist writeback module
//!
//! Claims media lists and their entries. Rebuilds the playlist file from the
//! entry contents stored for its URL.

use std::path::Path;
use std::sync::Arc;

use oxigraph::model::Term;
use oxigraph::sparql::QueryResults;

use tracker_ontology::constants;

use crate::storage::MetadataStore;
use crate::writeback::file::{FileWriteback, FileWritebackHost};
use crate::writeback::module::WritebackModuleDesc;
use crate::writeback::{Cancellation, WritebackRows};

pub fn module() -> WritebackModuleDesc {
    WritebackModuleDesc {
        name: "playlist",
        rdf_types: &["nfo:MediaList", "nfo:MediaFileListEntry"],
        content_types: &[
            "audio/x-mpegurl",
            "audio/mpegurl",
            "application/vnd.apple.mpegurl",
            "audio/x-scpls",
        ],
        create: Arc::new(|| Box::new(FileWritebackHost::new(PlaylistWriteback))),
    }
}

struct PlaylistWriteback;

impl FileWriteback for PlaylistWriteback {
    fn write_file_metadata(
        &mut self,
        path: &Path,
        rows: &WritebackRows,
        store: &MetadataStore,
        cancellation: &Cancellation,
    ) -> bool {
        let Some(url) = rows.first().and_then(|row| row.first()) else {
            return false;
        };

        let sparql = format!(
            "SELECT ?entry WHERE {{ ?u a <{nfo}MediaFileListEntry> ; \
             <{nie}url> \"{url}\" ; <{nfo}entryContent> ?entry }} ORDER BY ?entry",
            nfo = constants::PREFIX_NFO,
            nie = constants::PREFIX_NIE,
        );

        let entries = match store.query(&sparql) {
            Ok(QueryResults::Solutions(solutions)) => {
                let mut entries = Vec::new();
                for solution in solutions {
                    let Ok(solution) = solution else {
                        return false;
                    };
                    if let Some(Term::Literal(literal)) = solution.get("entry") {
                        entries.push(literal.value().to_string());
                    }
                }
                entries
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!("playlist entry query failed: {e}");
                return false;
            }
        };

        if cancellation.is_cancelled() {
            return false;
        }

        let mut contents = String::from("#EXTM3U\n");
        for entry in &entries {
            contents.push_str(entry);
            contents.push('\n');
        }

        match std::fs::write(path, contents) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to rewrite playlist {}: {e}", path.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rebuilds_playlist_from_store() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("mix.m3u");
        std::fs::write(&target, b"stale").unwrap();
        let url = format!("file://{}", target.display());

        let store = MetadataStore::new().unwrap();
        store
            .load_turtle(&format!(
                "@prefix nfo: <{nfo}> .\n\
                 @prefix nie: <{nie}> .\n\
                 <urn:entry:1> a nfo:MediaFileListEntry ;\n\
                 \tnie:url \"{url}\" ;\n\
                 \tnfo:entryContent \"/music/a.mp3\" .\n\
                 <urn:entry:2> a nfo:MediaFileListEntry ;\n\
                 \tnie:url \"{url}\" ;\n\
                 \tnfo:entryContent \"/music/b.mp3\" .\n",
                nfo = constants::PREFIX_NFO,
                nie = constants::PREFIX_NIE,
            ))
            .unwrap();

        let rows = vec![vec![url.clone()]];
        let mut writeback = PlaylistWriteback;
        assert!(writeback.write_file_metadata(&target, &rows, &store, &Cancellation::new()));

        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("#EXTM3U\n"));
        assert!(written.contains("/music/a.mp3"));
        assert!(written.contains("/music/b.mp3"));
    }
}
