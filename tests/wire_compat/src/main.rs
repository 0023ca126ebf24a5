//! Wire compatibility checks for the resumable upload protocol.
//!
//! Each fixture under `fixtures/` records values an existing server
//! deployment depends on: file identifiers, parameter order, chunk count
//! parsing and chunk boundaries. Any drift from them breaks resumption of
//! uploads started by other clients.

fn main() {
    println!("Run `cargo test -p wire-compat` to check the protocol fixtures.");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use resup_protocol::{
        ChunkWrite, ProtocolError, ResumeQuery, file_extension, file_id, parse_chunk_count,
    };
    use resup_transfer::ChunkLayout;
    use serde::Deserialize;
    use serde::de::DeserializeOwned;

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture<T: DeserializeOwned>(name: &str) -> T {
        let path = fixtures_dir().join(name);
        let data = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("reading {}: {e}", path.display()));
        serde_json::from_str(&data).unwrap_or_else(|e| panic!("parsing {name}: {e}"))
    }

    fn at_millis(ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(ms)
    }

    fn pairs(raw: &[(String, String)]) -> Vec<(&str, &str)> {
        raw.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[derive(Deserialize)]
    struct FileIdCase {
        size: u64,
        modified_ms: Option<u64>,
        now_ms: u64,
        name: String,
        id: String,
    }

    #[test]
    fn file_identifiers() {
        let cases: Vec<FileIdCase> = load_fixture("file_ids.json");
        assert!(!cases.is_empty());
        for case in cases {
            let got = file_id(
                case.size,
                case.modified_ms.map(at_millis),
                &case.name,
                at_millis(case.now_ms),
            );
            assert_eq!(got, case.id, "file id of {:?}", case.name);
        }
    }

    #[derive(Deserialize)]
    struct ExtensionCase {
        name: String,
        extension: String,
    }

    #[test]
    fn file_extensions() {
        let cases: Vec<ExtensionCase> = load_fixture("extensions.json");
        for case in cases {
            assert_eq!(
                file_extension(&case.name),
                case.extension,
                "extension of {:?}",
                case.name
            );
        }
    }

    #[derive(Deserialize)]
    struct ChunkCountCase {
        body: String,
        total: u64,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        error: Option<String>,
    }

    #[test]
    fn chunk_count_bodies() {
        let cases: Vec<ChunkCountCase> = load_fixture("chunk_counts.json");
        for case in cases {
            let result = parse_chunk_count(&case.body, case.total);
            match (case.count, case.error.as_deref()) {
                (Some(count), None) => {
                    assert_eq!(result, Ok(count), "body {:?}", case.body);
                }
                (None, Some("malformed")) => assert!(
                    matches!(result, Err(ProtocolError::MalformedCount(_))),
                    "body {:?} gave {result:?}",
                    case.body
                ),
                (None, Some("out_of_range")) => assert!(
                    matches!(result, Err(ProtocolError::CountOutOfRange { .. })),
                    "body {:?} gave {result:?}",
                    case.body
                ),
                _ => panic!("bad fixture entry for body {:?}", case.body),
            }
        }
    }

    #[derive(Deserialize)]
    struct ResumeQueryCase {
        file_id: String,
        file_name: String,
        file_size: u64,
        extra: BTreeMap<String, String>,
        cache_bust: u64,
        params: Vec<(String, String)>,
    }

    #[test]
    fn resume_query_parameters() {
        let case: ResumeQueryCase = load_fixture("resume_query.json");
        let query = ResumeQuery {
            file_id: case.file_id,
            file_name: case.file_name,
            file_size: case.file_size,
        };
        let params = query.params(&case.extra, case.cache_bust);
        assert_eq!(pairs(&params), pairs(&case.params));
    }

    #[derive(Deserialize)]
    struct ChunkWriteCase {
        file_id: String,
        chunk_number: u64,
        extra: BTreeMap<String, String>,
        fields: Vec<(String, String)>,
    }

    #[test]
    fn chunk_write_fields() {
        let case: ChunkWriteCase = load_fixture("chunk_write.json");
        let write = ChunkWrite {
            file_id: case.file_id,
            chunk_number: case.chunk_number,
            field_name: "resup_chunk".into(),
            data: Vec::new(),
        };
        let fields = write.fields(&case.extra);
        assert_eq!(pairs(&fields), pairs(&case.fields));
    }

    #[derive(Deserialize)]
    struct LayoutCase {
        size: u64,
        chunk_size: u64,
        total_chunks: u64,
        ranges: Vec<(u64, u64)>,
    }

    #[test]
    fn chunk_boundaries() {
        let cases: Vec<LayoutCase> = load_fixture("chunk_layouts.json");
        for case in cases {
            let layout = ChunkLayout::new(case.size, case.chunk_size);
            assert_eq!(layout.total_chunks(), case.total_chunks, "size {}", case.size);

            let ranges: Vec<(u64, u64)> = (0..layout.total_chunks())
                .map(|uploaded| layout.next_range(uploaded))
                .map(|r| (r.start, r.end))
                .collect();
            assert_eq!(ranges, case.ranges, "size {}", case.size);
            assert_eq!(layout.bytes_for(layout.total_chunks()), case.size);
        }
    }
}
