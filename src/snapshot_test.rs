use super::*;
use flate2::read::GzDecoder;
use pretty_assertions::assert_eq;
use std::io::Read;

fn sample_tree() -> FrameNode {
    let mut iframes = HashMap::new();
    iframes.insert(
        "cmp-frame".to_string(),
        FrameNode {
            doc_url: "https://cmp.example.net/dialog".to_string(),
            source: "<html><body>consent</body></html>".to_string(),
            iframes: HashMap::new(),
        },
    );
    iframes.insert(
        "frame-1".to_string(),
        FrameNode {
            doc_url: "about:blank".to_string(),
            source: "<html></html>".to_string(),
            iframes: HashMap::new(),
        },
    );
    FrameNode {
        doc_url: "https://www.example.com/".to_string(),
        source: "<html><body>page</body></html>".to_string(),
        iframes,
    }
}

#[test]
fn test_frame_tree_serde_round_trip() {
    let tree = sample_tree();
    let json = serde_json::to_string(&tree).unwrap();
    let back: FrameNode = serde_json::from_str(&json).unwrap();
    assert_eq!(back, tree);
}

#[test]
fn test_frame_tree_field_names() {
    let json = serde_json::to_string(&sample_tree()).unwrap();
    assert!(json.contains("\"doc_url\""));
    assert!(json.contains("\"source\""));
    assert!(json.contains("\"iframes\""));
    assert!(json.contains("\"cmp-frame\""));
}

#[test]
fn test_compressed_archive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("1-abc.json.gz");

    let tree = sample_tree();
    write_compressed_json(&path, &tree).unwrap();

    let mut decoder = GzDecoder::new(std::fs::File::open(&path).unwrap());
    let mut json = String::new();
    decoder.read_to_string(&mut json).unwrap();
    let back: FrameNode = serde_json::from_str(&json).unwrap();

    assert_eq!(back, tree);
    assert_eq!(back.iframes.len(), 2);
    assert_eq!(
        back.iframes["cmp-frame"].doc_url,
        "https://cmp.example.net/dialog"
    );
}

#[test]
fn test_compressed_archive_is_gzip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("2-def.json.gz");
    write_compressed_json(&path, &sample_tree()).unwrap();

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
}
