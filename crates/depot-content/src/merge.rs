use depot_model::StoreKey;

use crate::error::{ContentError, ContentResult};

/// Merges aggregable metadata gathered from multiple candidates.
///
/// Hits arrive in candidate priority order (highest first); on conflicting
/// sub-entries the earliest contributor must win. Real metadata formats
/// (package indexes, version manifests) plug in their own implementation;
/// the core only requires the priority contract.
pub trait MetadataMerger: Send + Sync {
    fn merge(&self, path: &str, hits: &[(StoreKey, Vec<u8>)]) -> ContentResult<Vec<u8>>;
}

/// Line-oriented union merger.
///
/// Treats each document as a sequence of lines and emits the first-seen
/// occurrence of every distinct line, preserving order. Good enough for
/// listing-style documents; a format-aware merger should replace it for
/// structured metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineMerger;

impl MetadataMerger for LineMerger {
    fn merge(&self, path: &str, hits: &[(StoreKey, Vec<u8>)]) -> ContentResult<Vec<u8>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = String::new();
        for (store, bytes) in hits {
            let text = std::str::from_utf8(bytes).map_err(|e| ContentError::MergeFailed {
                path: path.to_string(),
                reason: format!("non-utf8 content from {store}: {e}"),
            })?;
            for line in text.lines() {
                if seen.insert(line.to_string()) {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_contributor_wins_on_shared_lines() {
        let a = StoreKey::hosted("maven", "a");
        let b = StoreKey::remote("maven", "b");
        let merged = LineMerger
            .merge(
                "/maven-metadata.xml",
                &[
                    (a, b"1.0\n1.1\n".to_vec()),
                    (b, b"1.1\n2.0\n".to_vec()),
                ],
            )
            .unwrap();
        assert_eq!(merged, b"1.0\n1.1\n2.0\n".to_vec());
    }

    #[test]
    fn non_utf8_input_is_a_merge_failure() {
        let a = StoreKey::hosted("maven", "a");
        let err = LineMerger
            .merge("/maven-metadata.xml", &[(a, vec![0xff, 0xfe])])
            .unwrap_err();
        assert!(matches!(err, ContentError::MergeFailed { .. }));
    }
}
